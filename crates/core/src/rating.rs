//! Review ratings and their aggregates.

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("rating must be between 1 and 5, got {0}")]
pub struct RatingError(pub i64);

/// A star rating from 1 to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// # Errors
    ///
    /// Returns [`RatingError`] if `value` is outside 1..=5.
    pub fn new(value: i16) -> Result<Self, RatingError> {
        u8::try_from(value)
            .ok()
            .filter(|v| (Self::MIN..=Self::MAX).contains(v))
            .map(Self)
            .ok_or(RatingError(i64::from(value)))
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i16> for Rating {
    type Error = RatingError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for i16 {
    fn from(rating: Rating) -> Self {
        Self::from(rating.0)
    }
}

/// Aggregate of all ratings on a product.
///
/// `histogram[0]` counts one-star reviews, `histogram[4]` five-star ones.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub count: u32,
    pub average: Option<f64>,
    pub histogram: [u32; 5],
}

impl RatingSummary {
    /// Build a summary from `(stars, count)` pairs such as a
    /// `GROUP BY rating` result. Pairs outside 1..=5 are ignored.
    #[must_use]
    pub fn from_counts<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = (i16, i64)>,
    {
        let mut histogram = [0_u32; 5];
        for (stars, count) in counts {
            let Ok(rating) = Rating::new(stars) else {
                continue;
            };
            let slot = usize::from(rating.get() - 1);
            if let Some(bucket) = histogram.get_mut(slot) {
                *bucket = bucket.saturating_add(u32::try_from(count).unwrap_or(u32::MAX));
            }
        }

        let count: u32 = histogram.iter().sum();
        let average = (count > 0).then(|| {
            let weighted: u64 = histogram
                .iter()
                .zip(1_u64..)
                .map(|(n, stars)| u64::from(*n) * stars)
                .sum();
            #[allow(clippy::cast_precision_loss)] // counts stay far below 2^52
            let raw = weighted as f64 / f64::from(count);
            round_to_tenth(raw)
        });

        Self {
            count,
            average,
            histogram,
        }
    }
}

impl FromIterator<Rating> for RatingSummary {
    fn from_iter<I: IntoIterator<Item = Rating>>(iter: I) -> Self {
        Self::from_counts(iter.into_iter().map(|r| (i16::from(r), 1)))
    }
}

/// Round an average rating to one decimal place for display.
#[must_use]
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
