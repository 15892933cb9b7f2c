mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn average_cost_follows_course_writes() -> Result<()> {
    let server = common::ensure_server().await?;
    let token = common::register(server, "publisher").await?;
    let id = common::create_bootcamp(server, &token).await?;

    let first = common::create_course(server, &token, &id, 10000).await?;
    common::create_course(server, &token, &id, 12505).await?;
    assert_eq!(common::get_bootcamp(server, &id).await?["averageCost"], json!(11260));

    let first_id = first["id"].as_str().unwrap_or_default();
    let res = reqwest::Client::new()
        .put(server.url(&format!("/courses/{}", first_id)))
        .bearer_auth(&token)
        .json(&json!({ "tuition": 2495 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    // mean 7500
    assert_eq!(common::get_bootcamp(server, &id).await?["averageCost"], json!(7500));
    Ok(())
}

#[tokio::test]
async fn removing_every_course_clears_average_cost() -> Result<()> {
    let server = common::ensure_server().await?;
    let token = common::register(server, "publisher").await?;
    let id = common::create_bootcamp(server, &token).await?;
    let course = common::create_course(server, &token, &id, 4000).await?;
    assert_eq!(common::get_bootcamp(server, &id).await?["averageCost"], json!(4000));

    let res = reqwest::Client::new()
        .delete(server.url(&format!("/courses/{}", course["id"].as_str().unwrap_or_default())))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(common::get_bootcamp(server, &id).await?["averageCost"], Value::Null);
    Ok(())
}

#[tokio::test]
async fn bulk_course_delete_clears_average_cost() -> Result<()> {
    let server = common::ensure_server().await?;
    let token = common::register(server, "publisher").await?;
    let id = common::create_bootcamp(server, &token).await?;
    common::create_course(server, &token, &id, 1000).await?;
    common::create_course(server, &token, &id, 2000).await?;

    let res = reqwest::Client::new()
        .delete(server.url(&format!("/bootcamps/{}/courses", id)))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["data"]["deleted"], json!(2));
    assert_eq!(common::get_bootcamp(server, &id).await?["averageCost"], Value::Null);
    Ok(())
}

async fn post_review(server: &common::TestServer, token: &str, bootcamp_id: &str, rating: i64) -> Result<reqwest::Response> {
    Ok(reqwest::Client::new()
        .post(server.url(&format!("/bootcamps/{}/reviews", bootcamp_id)))
        .bearer_auth(token)
        .json(&json!({ "title": "Solid", "text": "Worth it", "rating": rating }))
        .send()
        .await?)
}

#[tokio::test]
async fn average_rating_is_the_plain_mean() -> Result<()> {
    let server = common::ensure_server().await?;
    let publisher = common::register(server, "publisher").await?;
    let id = common::create_bootcamp(server, &publisher).await?;

    for rating in [8, 7] {
        let reviewer = common::register(server, "user").await?;
        assert_eq!(post_review(server, &reviewer, &id, rating).await?.status(), StatusCode::CREATED);
    }
    assert_eq!(common::get_bootcamp(server, &id).await?["averageRating"], json!(7.5));
    Ok(())
}

#[tokio::test]
async fn deleting_a_review_recomputes_average_rating() -> Result<()> {
    let server = common::ensure_server().await?;
    let publisher = common::register(server, "publisher").await?;
    let id = common::create_bootcamp(server, &publisher).await?;

    let harsh = common::register(server, "user").await?;
    let review = common::create_review(server, &harsh, &id, 2).await?;
    let kind = common::register(server, "user").await?;
    common::create_review(server, &kind, &id, 10).await?;
    assert_eq!(common::get_bootcamp(server, &id).await?["averageRating"], json!(6));

    let res = reqwest::Client::new()
        .delete(server.url(&format!("/reviews/{}", review["id"].as_str().unwrap_or_default())))
        .bearer_auth(&harsh)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(common::get_bootcamp(server, &id).await?["averageRating"], json!(10));
    Ok(())
}

#[tokio::test]
async fn bulk_review_delete_clears_average_rating() -> Result<()> {
    let server = common::ensure_server().await?;
    let publisher = common::register(server, "publisher").await?;
    let id = common::create_bootcamp(server, &publisher).await?;
    for rating in [3, 9] {
        let reviewer = common::register(server, "user").await?;
        common::create_review(server, &reviewer, &id, rating).await?;
    }
    assert_eq!(common::get_bootcamp(server, &id).await?["averageRating"], json!(6));

    let res = reqwest::Client::new()
        .delete(server.url(&format!("/bootcamps/{}/reviews", id)))
        .bearer_auth(&publisher)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["data"]["deleted"], json!(2));
    assert_eq!(common::get_bootcamp(server, &id).await?["averageRating"], Value::Null);
    Ok(())
}

#[tokio::test]
async fn second_review_by_same_user_is_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let publisher = common::register(server, "publisher").await?;
    let id = common::create_bootcamp(server, &publisher).await?;
    let reviewer = common::register(server, "user").await?;

    assert_eq!(post_review(server, &reviewer, &id, 9).await?.status(), StatusCode::CREATED);
    let res = post_review(server, &reviewer, &id, 1).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let listed: Value = reqwest::get(server.url(&format!("/bootcamps/{}/reviews", id)))
        .await?
        .json()
        .await?;
    assert_eq!(listed["count"], json!(1));
    assert_eq!(common::get_bootcamp(server, &id).await?["averageRating"], json!(9));
    Ok(())
}

#[tokio::test]
async fn reviews_on_missing_bootcamp_are_not_found() -> Result<()> {
    let server = common::ensure_server().await?;
    let reviewer = common::register(server, "user").await?;
    let res = post_review(server, &reviewer, "00000000-0000-0000-0000-000000000000", 5).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}
