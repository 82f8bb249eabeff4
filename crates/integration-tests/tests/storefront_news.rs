//! News feed, filters and article editing.
//!
//! Requires a running storefront and the admin credentials from the crate
//! docs.

#![allow(clippy::unwrap_used)]

use discvault_integration_tests::TestClient;
use reqwest::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

fn token() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    hex.get(..12).unwrap().to_owned()
}

async fn create_author(admin: &TestClient) -> Value {
    let resp = admin
        .post(
            "/api/news/authors",
            &json!({ "name": "Staff Writer", "slug": format!("writer-{}", token()), "bio": "" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.unwrap()
}

async fn publish(admin: &TestClient, author: &Value, tags: &[&str], published_at: &str) -> Value {
    let resp = admin
        .post(
            "/api/news",
            &json!({
                "authorId": author["id"],
                "title": "Vault notes",
                "slug": format!("notes-{}", token()),
                "summary": "What arrived this week",
                "tags": tags,
                "publishedAt": published_at,
                "markdown": "# Arrivals\n\nNew pressings on the shelf.",
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.unwrap()
}

async fn slugs(client: &TestClient, query: &str) -> Vec<String> {
    let page: Value = client
        .get(&format!("/api/news?{query}&pageSize=100"))
        .await
        .json()
        .await
        .unwrap();
    page["items"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|n| n["slug"].as_str().map(str::to_owned))
        .collect()
}

fn slug_of(article: &Value) -> String {
    article["slug"].as_str().unwrap().to_owned()
}

#[tokio::test]
#[ignore = "Requires running storefront and admin credentials"]
async fn test_feed_filters_by_tag_year_and_author() {
    let admin = TestClient::admin().await.unwrap();
    let author = create_author(&admin).await;
    let author_slug = author["slug"].as_str().unwrap();
    let tag = format!("tag{}", token());

    let tagged = publish(&admin, &author, &[&tag], "1991-06-01T12:00:00Z").await;
    let untagged = publish(&admin, &author, &[], "1992-03-15T12:00:00Z").await;
    let other_author = create_author(&admin).await;
    let foreign = publish(&admin, &other_author, &[&tag], "1991-09-01T12:00:00Z").await;

    let anonymous = TestClient::anonymous();

    let by_tag = slugs(&anonymous, &format!("tag={tag}")).await;
    assert_eq!(by_tag.len(), 2);
    assert!(by_tag.contains(&slug_of(&tagged)));
    assert!(by_tag.contains(&slug_of(&foreign)));

    let by_author = slugs(&anonymous, &format!("author={author_slug}")).await;
    assert_eq!(by_author, vec![slug_of(&untagged), slug_of(&tagged)]);

    let by_year = slugs(&anonymous, &format!("year=1991&author={author_slug}")).await;
    assert_eq!(by_year, vec![slug_of(&tagged)]);

    let years: Value = anonymous.get("/api/news/years").await.json().await.unwrap();
    let years: Vec<i64> = years
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|y| y["year"].as_i64())
        .collect();
    assert!(years.contains(&1991));
    assert!(years.contains(&1992));
    assert!(years.windows(2).all(|w| matches!(w, [a, b] if a > b)), "years not newest first: {years:?}");
}

#[tokio::test]
#[ignore = "Requires running storefront and admin credentials"]
async fn test_scheduled_article_is_hidden_until_published() {
    let admin = TestClient::admin().await.unwrap();
    let author = create_author(&admin).await;
    let article = publish(&admin, &author, &[], "2999-01-01T00:00:00Z").await;
    let slug = slug_of(&article);

    let anonymous = TestClient::anonymous();
    let resp = anonymous.get(&format!("/api/news/{slug}")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = admin.get(&format!("/api/news/{slug}")).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let author_slug = author["slug"].as_str().unwrap();
    assert!(slugs(&anonymous, &format!("author={author_slug}")).await.is_empty());
}

#[tokio::test]
#[ignore = "Requires running storefront and admin credentials"]
async fn test_duplicate_slug_is_conflict() {
    let admin = TestClient::admin().await.unwrap();
    let author = create_author(&admin).await;
    let article = publish(&admin, &author, &[], "2001-01-01T00:00:00Z").await;

    let resp = admin
        .post(
            "/api/news",
            &json!({
                "authorId": author["id"],
                "title": "Another title",
                "slug": article["slug"],
                "markdown": "Different body",
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running storefront and admin credentials"]
async fn test_rename_moves_the_body_and_missing_markdown_keeps_it() {
    let admin = TestClient::admin().await.unwrap();
    let author = create_author(&admin).await;
    let article = publish(&admin, &author, &["pressings"], "2002-02-02T00:00:00Z").await;
    let old_slug = slug_of(&article);
    let new_slug = format!("renamed-{}", token());

    let resp = admin
        .put(
            &format!("/api/news/{old_slug}"),
            &json!({
                "authorId": author["id"],
                "title": "Vault notes, revised",
                "slug": new_slug,
                "summary": "Updated",
                "publishedAt": "2002-02-02T00:00:00Z",
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let renamed: Value = resp.json().await.unwrap();
    assert_eq!(renamed["slug"], new_slug.as_str());
    assert_eq!(renamed["title"], "Vault notes, revised");
    assert_eq!(renamed["markdown"], article["markdown"]);

    let resp = admin.get(&format!("/api/news/{old_slug}")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let fetched: Value = TestClient::anonymous()
        .get(&format!("/api/news/{new_slug}"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["markdown"], article["markdown"]);

    let resp = admin
        .put(
            &format!("/api/news/{new_slug}"),
            &json!({
                "authorId": author["id"],
                "title": "Vault notes, final",
                "slug": new_slug,
                "publishedAt": "2002-02-02T00:00:00Z",
                "markdown": "Rewritten.",
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let rewritten: Value = resp.json().await.unwrap();
    assert_eq!(rewritten["markdown"], "Rewritten.");
}
