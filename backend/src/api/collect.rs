use crate::error::AppResult;
use crate::models::{
    CollectRequest, CollectResponse, PopularRequest, PopularResponse,
};
use crate::services::collector::{self, CollectParams, PopularParams};
use crate::AppState;
use log::info;
use rocket::serde::json::Json;
use rocket::{post, State};

#[post("/", data = "<request>")]
pub async fn collect_shorts(
    request: Json<CollectRequest>,
    state: &State<AppState>,
) -> AppResult<Json<CollectResponse>> {
    let params = CollectParams::from_request(&request, &state.config.default_region)?;

    let records = collector::collect_keywords(state.platform.as_ref(), &params).await?;
    let snapshot = state.snapshots.save(&records)?;

    info!(
        "Collected {} shorts for keywords [{}]",
        records.len(),
        params.keywords.join(", ")
    );

    Ok(Json(CollectResponse {
        total: records.len(),
        keywords_used: params.keywords,
        snapshot,
    }))
}

#[post("/popular", data = "<request>")]
pub async fn collect_popular(
    request: Json<PopularRequest>,
    state: &State<AppState>,
) -> AppResult<Json<PopularResponse>> {
    let params = PopularParams::from_request(&request, &state.config.default_region)?;
    let videos = collector::collect_most_popular(state.platform.as_ref(), &params).await?;

    Ok(Json(PopularResponse {
        total: videos.len(),
        videos,
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::testing::client;
    use crate::services::youtube_client::fake::{video, FakePlatform};
    use crate::services::youtube_client::DetailsPage;
    use rocket::http::{ContentType, Status};
    use serde_json::{json, Value};

    async fn post_collect(platform: FakePlatform, body: Value) -> (Status, Value) {
        let dir = tempfile::tempdir().expect("tempdir");
        let client = client(platform, dir.path()).await;
        let response = client
            .post("/collect")
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch()
            .await;
        let status = response.status();
        let body = response.into_json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn post_raw(path: &str, body: &str) -> (Status, Value) {
        let dir = tempfile::tempdir().expect("tempdir");
        let client = client(FakePlatform::default(), dir.path()).await;
        let response = client
            .post(path.to_string())
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch()
            .await;
        let status = response.status();
        let body = response.into_json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    #[rocket::async_test]
    async fn numeric_fields_accept_form_strings() {
        let platform = FakePlatform::default().with_keyword("cats", vec![video("a", 20, 10)]);
        let (status, body) = post_collect(
            platform,
            json!({ "keywords": "cats", "days": "3", "max_results": "5" }),
        )
        .await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body["total"], 1);

        let platform = FakePlatform::default().with_keyword("cats", vec![video("a", 20, 10)]);
        let (status, _) =
            post_collect(platform, json!({ "keywords": "cats", "days": "", "max_results": null }))
                .await;
        assert_eq!(status, Status::Ok);
    }

    #[rocket::async_test]
    async fn non_numeric_fields_return_validation_error() {
        let (status, body) =
            post_collect(FakePlatform::default(), json!({ "keywords": "cats", "days": "abc" }))
                .await;
        assert_eq!(status, Status::BadRequest);
        assert_eq!(body["error"], "validation_error");

        let (status, body) = post_collect(
            FakePlatform::default(),
            json!({ "keywords": "cats", "max_results": 2.5 }),
        )
        .await;
        assert_eq!(status, Status::BadRequest);
        assert_eq!(body["error"], "validation_error");
    }

    #[rocket::async_test]
    async fn unparseable_bodies_return_json_400() {
        for raw in ["", "{not json", "[1, 2]", r#"{"keyword_list": "cats"}"#] {
            let (status, body) = post_raw("/collect", raw).await;
            assert_eq!(status, Status::BadRequest, "body {raw:?}");
            assert_eq!(body["error"], "validation_error", "body {raw:?}");
        }

        let (status, body) = post_raw("/collect/popular", "").await;
        assert_eq!(status, Status::BadRequest);
        assert_eq!(body["error"], "validation_error");
    }

    #[rocket::async_test]
    async fn missing_keywords_returns_400() {
        let (status, body) = post_collect(FakePlatform::default(), json!({})).await;
        assert_eq!(status, Status::BadRequest);
        assert_eq!(body["message"], "keywords is required");

        let (status, _) = post_collect(FakePlatform::default(), json!({ "keywords": "" })).await;
        assert_eq!(status, Status::BadRequest);

        let (status, _) =
            post_collect(FakePlatform::default(), json!({ "keyword_list": [] })).await;
        assert_eq!(status, Status::BadRequest);
    }

    #[rocket::async_test]
    async fn out_of_range_parameters_return_400() {
        let (status, _) = post_collect(
            FakePlatform::default(),
            json!({ "keywords": "test", "max_results": 10001 }),
        )
        .await;
        assert_eq!(status, Status::BadRequest);

        let (status, _) = post_collect(
            FakePlatform::default(),
            json!({ "keywords": "test", "max_results": 0 }),
        )
        .await;
        assert_eq!(status, Status::BadRequest);

        let (status, _) = post_collect(
            FakePlatform::default(),
            json!({ "keywords": "test", "days": -1 }),
        )
        .await;
        assert_eq!(status, Status::BadRequest);
    }

    #[rocket::async_test]
    async fn duplicate_videos_are_merged() {
        let platform = FakePlatform::default()
            .with_keyword("keyword1", vec![video("video_123", 30, 1000), video("video_456", 45, 2000)])
            .with_keyword("keyword2", vec![video("video_123", 30, 1000)]);

        let (status, body) = post_collect(
            platform,
            json!({ "keyword_list": ["keyword1", "keyword2"], "max_results": 10 }),
        )
        .await;

        assert_eq!(status, Status::Ok);
        assert_eq!(body["total"], 2);
        assert_eq!(body["saved"], 2);
        assert_eq!(body["preview_count"], 2);
        assert_eq!(body["keywords_used"], json!(["keyword1", "keyword2"]));
    }

    #[rocket::async_test]
    async fn different_videos_are_all_kept() {
        let videos: Vec<_> = (0..5)
            .map(|i| video(&format!("video_{i}"), 30, i * 100))
            .collect();
        let platform = FakePlatform::default()
            .with_keyword("kw1", videos[..3].to_vec())
            .with_keyword("kw2", videos[3..].to_vec());

        let (status, body) = post_collect(
            platform,
            json!({ "keyword_list": ["kw1", "kw2"], "max_results": 10 }),
        )
        .await;

        assert_eq!(status, Status::Ok);
        assert_eq!(body["total"], 5);
        assert_eq!(body["preview_count"], 3);
    }

    #[rocket::async_test]
    async fn upstream_failure_returns_500() {
        let platform = FakePlatform {
            failing_keywords: vec!["broken".to_string()],
            ..Default::default()
        };
        let (status, body) = post_collect(platform, json!({ "keywords": "broken" })).await;
        assert_eq!(status, Status::InternalServerError);
        assert_eq!(body["error"], "upstream_error");
    }

    #[rocket::async_test]
    async fn popular_returns_filtered_shorts() {
        let mut platform = FakePlatform::default();
        platform.popular_pages.insert(
            None,
            DetailsPage {
                items: vec![video("short", 20, 5), video("long", 120, 50)],
                next_page_token: None,
            },
        );
        let dir = tempfile::tempdir().expect("tempdir");
        let client = client(platform, dir.path()).await;

        let response = client
            .post("/collect/popular")
            .header(ContentType::JSON)
            .body(json!({ "max_results": 5, "days": 0 }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let body = response.into_json::<Value>().await.expect("json");
        assert_eq!(body["total"], 1);
        assert_eq!(body["videos"][0]["video_id"], "short");
    }
}
