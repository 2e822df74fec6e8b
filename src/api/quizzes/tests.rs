use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use serde_json::{json, Map, Value};
use tower::ServiceExt;

use crate::services::provider::{ProviderError, TextGenerationProvider};
use crate::test_support::{self, TestContext};

/// Answers multiple-choice prompts with two questions and fails every other prompt.
struct MultipleChoiceOnlyProvider;

#[async_trait]
impl TextGenerationProvider for MultipleChoiceOnlyProvider {
    async fn complete(
        &self,
        system_instruction: &str,
        _user_content: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<String, ProviderError> {
        if !system_instruction.contains("multiple choice") {
            return Err(ProviderError::Status { status: 503, message: "overloaded".to_string() });
        }
        Ok(json!({"questions": [
            {"question": "Which river reaches the Atlantic Ocean?", "choices": ["Amazon", "Nile", "Volga"], "correct_answer": "Amazon", "explanation": "Stated in the first sentence."},
            {"question": "Who completed the first known descent?", "choices": ["A) Orellana", "B) Magellan"], "correct_answer": "A"}
        ]})
        .to_string())
    }
}

async fn seed_owner(ctx: &TestContext, username: &str) -> (String, String) {
    let user = test_support::insert_user(ctx.state.db(), username, "Quiz Owner").await;
    let document =
        test_support::insert_document(ctx.state.db(), &user.id, "Rivers", test_support::SAMPLE_TEXT)
            .await;
    let token = test_support::bearer_token(&user.id, ctx.state.settings());
    (token, document.id)
}

async fn generate(ctx: &TestContext, token: &str, body: Value) -> (StatusCode, Value) {
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/quizzes/generate",
            Some(token),
            Some(body),
        ))
        .await
        .expect("generate quiz");
    let status = response.status();
    (status, test_support::read_json(response).await)
}

async fn revealed_quiz(ctx: &TestContext, token: &str, quiz_id: &str) -> Value {
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/quizzes/{quiz_id}?reveal_answers=true"),
            Some(token),
            None,
        ))
        .await
        .expect("get quiz");
    assert_eq!(response.status(), StatusCode::OK);
    test_support::read_json(response).await
}

fn correct_answers(quiz: &Value) -> Value {
    let mut answers = Map::new();
    for question in quiz["questions"].as_array().expect("questions") {
        let id = question["id"].as_str().expect("question id").to_string();
        answers.insert(id, question["correct_answer"].clone());
    }
    Value::Object(answers)
}

async fn submit(ctx: &TestContext, token: &str, quiz_id: &str, answers: Value) -> (StatusCode, Value) {
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/quizzes/{quiz_id}/submit"),
            Some(token),
            Some(json!({ "answers": answers })),
        ))
        .await
        .expect("submit quiz");
    let status = response.status();
    (status, test_support::read_json(response).await)
}

async fn attempt_rows(ctx: &TestContext) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM quiz_attempts")
        .fetch_one(ctx.state.db())
        .await
        .expect("count attempts")
}

#[tokio::test]
async fn heuristic_generation_persists_quiz_without_revealing_answers() {
    let ctx = test_support::setup_test_context().await;
    let (token, document_id) = seed_owner(&ctx, "student01").await;

    let (status, quiz) = generate(
        &ctx,
        &token,
        json!({"document_id": document_id, "num_questions": 4, "method": "simple", "seed": 7}),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "response: {quiz}");
    assert_eq!(quiz["title"], "Quiz for Rivers");
    assert_eq!(quiz["generation_method"], "heuristic");
    let questions = quiz["questions"].as_array().expect("questions");
    assert_eq!(questions.len(), 4);
    assert_eq!(quiz["question_count"], 4);
    let types: Vec<&str> =
        questions.iter().map(|question| question["question_type"].as_str().unwrap()).collect();
    assert_eq!(types, vec!["mcq", "tf", "fill", "mcq"]);
    for (index, question) in questions.iter().enumerate() {
        assert_eq!(question["order_index"], index as i64);
        assert!(question.get("correct_answer").is_none());
        for choice in question["choices"].as_array().expect("choices") {
            assert!(choice.get("is_correct").is_none());
        }
    }
    assert!(questions[2]["choices"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn custom_title_and_question_type_subset_are_respected() {
    let ctx = test_support::setup_test_context().await;
    let (token, document_id) = seed_owner(&ctx, "student02").await;

    let (status, quiz) = generate(
        &ctx,
        &token,
        json!({
            "document_id": document_id,
            "num_questions": 2,
            "method": "heuristic",
            "question_types": ["fill", "fill_blank"],
            "title": "  Chapter 4 review  ",
            "seed": 11
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "response: {quiz}");
    assert_eq!(quiz["title"], "Chapter 4 review");
    let questions = quiz["questions"].as_array().expect("questions");
    assert!(!questions.is_empty());
    assert!(questions.iter().all(|question| question["question_type"] == "fill"));
}

#[tokio::test]
async fn provider_questions_are_used_and_failed_types_fall_back() {
    let provider: Arc<dyn TextGenerationProvider> = Arc::new(MultipleChoiceOnlyProvider);
    let ctx = test_support::setup_test_context_with_provider(Some(provider)).await;
    let (token, document_id) = seed_owner(&ctx, "student03").await;

    let (status, quiz) = generate(
        &ctx,
        &token,
        json!({
            "document_id": document_id,
            "num_questions": 4,
            "method": "groq",
            "question_types": ["mcq", "tf"],
            "seed": 3
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "response: {quiz}");
    assert_eq!(quiz["generation_method"], "provider");
    let quiz_id = quiz["id"].as_str().expect("quiz id");

    let revealed = revealed_quiz(&ctx, &token, quiz_id).await;
    let questions = revealed["questions"].as_array().expect("questions");
    assert_eq!(questions.len(), 4);
    assert_eq!(questions[0]["question"], "Which river reaches the Atlantic Ocean?");
    assert_eq!(questions[0]["correct_answer"], "Amazon");
    assert_eq!(questions[1]["correct_answer"], "Orellana");
    assert_eq!(questions[2]["question_type"], "tf");
    assert_eq!(questions[3]["question_type"], "tf");
}

#[tokio::test]
async fn submitting_correct_answers_scores_full_marks() {
    let ctx = test_support::setup_test_context().await;
    let (token, document_id) = seed_owner(&ctx, "student04").await;

    let (_, quiz) = generate(
        &ctx,
        &token,
        json!({"document_id": document_id, "num_questions": 3, "method": "heuristic", "seed": 5}),
    )
    .await;
    let quiz_id = quiz["id"].as_str().expect("quiz id").to_string();
    let revealed = revealed_quiz(&ctx, &token, &quiz_id).await;

    let (status, result) = submit(&ctx, &token, &quiz_id, correct_answers(&revealed)).await;

    assert_eq!(status, StatusCode::OK, "response: {result}");
    assert_eq!(result["score"], 3);
    assert_eq!(result["total_questions"], 3);
    assert_eq!(result["percentage"], 100.0);
    let results = result["results"].as_array().expect("results");
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|item| item["is_correct"] == true));
    assert_eq!(results[0]["question_id"], revealed["questions"][0]["id"]);
}

#[tokio::test]
async fn each_submission_appends_one_attempt() {
    let ctx = test_support::setup_test_context().await;
    let (token, document_id) = seed_owner(&ctx, "student05").await;

    let (_, quiz) = generate(
        &ctx,
        &token,
        json!({"document_id": document_id, "num_questions": 3, "method": "heuristic", "seed": 9}),
    )
    .await;
    let quiz_id = quiz["id"].as_str().expect("quiz id").to_string();
    let revealed = revealed_quiz(&ctx, &token, &quiz_id).await;

    let (status, first) = submit(&ctx, &token, &quiz_id, json!({})).await;
    assert_eq!(status, StatusCode::OK, "response: {first}");
    assert_eq!(first["score"], 0);
    assert_eq!(first["percentage"], 0.0);
    assert!(first["results"].as_array().unwrap().iter().all(|item| item["user_answer"] == ""));

    let (status, second) = submit(&ctx, &token, &quiz_id, correct_answers(&revealed)).await;
    assert_eq!(status, StatusCode::OK, "response: {second}");
    assert_ne!(first["attempt_id"], second["attempt_id"]);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/attempts?quiz_id={quiz_id}"),
            Some(&token),
            None,
        ))
        .await
        .expect("list attempts");
    let attempts = test_support::read_json(response).await;
    assert_eq!(attempts["total_count"], 2);
    assert_eq!(attempts["items"][0]["quiz_title"], "Quiz for Rivers");

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/attempts?min_percentage=50",
            Some(&token),
            None,
        ))
        .await
        .expect("filter attempts");
    let filtered = test_support::read_json(response).await;
    assert_eq!(filtered["total_count"], 1);
    assert_eq!(filtered["items"][0]["percentage"], 100.0);
}

#[tokio::test]
async fn identical_submissions_record_identical_attempts() {
    let ctx = test_support::setup_test_context().await;
    let (token, document_id) = seed_owner(&ctx, "student08").await;

    let (_, quiz) = generate(
        &ctx,
        &token,
        json!({"document_id": document_id, "num_questions": 3, "method": "heuristic", "seed": 21}),
    )
    .await;
    let quiz_id = quiz["id"].as_str().expect("quiz id").to_string();
    let revealed = revealed_quiz(&ctx, &token, &quiz_id).await;

    let first_question = &revealed["questions"][0];
    let mut partial = Map::new();
    partial.insert(
        first_question["id"].as_str().expect("question id").to_string(),
        first_question["correct_answer"].clone(),
    );
    let answers = Value::Object(partial);

    let (status, first) = submit(&ctx, &token, &quiz_id, answers.clone()).await;
    assert_eq!(status, StatusCode::OK, "response: {first}");
    let (status, second) = submit(&ctx, &token, &quiz_id, answers).await;
    assert_eq!(status, StatusCode::OK, "response: {second}");

    assert_ne!(first["attempt_id"], second["attempt_id"]);
    assert_eq!(first["score"], 1);
    assert_eq!(first["score"], second["score"]);
    assert_eq!(first["percentage"], second["percentage"]);
    assert_eq!(first["results"], second["results"]);

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/attempts?quiz_id={quiz_id}"),
            Some(&token),
            None,
        ))
        .await
        .expect("list attempts");
    let attempts = test_support::read_json(response).await;
    assert_eq!(attempts["total_count"], 2);
    let items = attempts["items"].as_array().expect("items");
    assert_eq!(items[0]["score"], items[1]["score"]);
    assert_eq!(items[0]["percentage"], items[1]["percentage"]);
}

#[tokio::test]
async fn quizzes_of_other_users_are_not_found_and_not_graded() {
    let ctx = test_support::setup_test_context().await;
    let (owner_token, document_id) = seed_owner(&ctx, "student06").await;
    let outsider = test_support::insert_user(ctx.state.db(), "student07", "Outsider").await;
    let outsider_token = test_support::bearer_token(&outsider.id, ctx.state.settings());

    let (_, quiz) = generate(
        &ctx,
        &owner_token,
        json!({"document_id": document_id, "num_questions": 2, "method": "heuristic", "seed": 1}),
    )
    .await;
    let quiz_id = quiz["id"].as_str().expect("quiz id").to_string();

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/quizzes/{quiz_id}"),
            Some(&outsider_token),
            None,
        ))
        .await
        .expect("foreign quiz");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let (status, _) = submit(&ctx, &outsider_token, &quiz_id, json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = generate(
        &ctx,
        &outsider_token,
        json!({"document_id": document_id, "method": "heuristic"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert_eq!(attempt_rows(&ctx).await, 0);
}

#[tokio::test]
async fn short_document_is_rejected_with_bad_request() {
    let ctx = test_support::setup_test_context().await;
    let user = test_support::insert_user(ctx.state.db(), "student08", "Short Notes").await;
    let document = test_support::insert_document(
        ctx.state.db(),
        &user.id,
        "Stub",
        "Cells are small.  Very small indeed.",
    )
    .await;
    let token = test_support::bearer_token(&user.id, ctx.state.settings());

    let (status, body) =
        generate(&ctx, &token, json!({"document_id": document.id, "method": "heuristic"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    let quizzes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quizzes")
        .fetch_one(ctx.state.db())
        .await
        .expect("count quizzes");
    assert_eq!(quizzes, 0);
}

#[tokio::test]
async fn out_of_range_question_count_is_rejected() {
    let ctx = test_support::setup_test_context().await;
    let (token, document_id) = seed_owner(&ctx, "student09").await;

    for count in [0, 21] {
        let (status, body) = generate(
            &ctx,
            &token,
            json!({"document_id": document_id, "num_questions": count, "method": "heuristic"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    }
}

#[tokio::test]
async fn malformed_submissions_are_bad_requests_without_attempts() {
    let ctx = test_support::setup_test_context().await;
    let (token, document_id) = seed_owner(&ctx, "student10").await;

    let (_, quiz) = generate(
        &ctx,
        &token,
        json!({"document_id": document_id, "num_questions": 2, "method": "heuristic", "seed": 2}),
    )
    .await;
    let quiz_id = quiz["id"].as_str().expect("quiz id").to_string();

    let (status, _) = submit(&ctx, &token, &quiz_id, json!(["Amazon"])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = submit(&ctx, &token, &quiz_id, json!({"q": {"nested": true}})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::raw_json_request(
            Method::POST,
            &format!("/api/v1/quizzes/{quiz_id}/submit"),
            &token,
            "{\"answers\": {",
        ))
        .await
        .expect("malformed json");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(attempt_rows(&ctx).await, 0);
}

#[tokio::test]
async fn list_filters_and_delete_quiz() {
    let ctx = test_support::setup_test_context().await;
    let (token, document_id) = seed_owner(&ctx, "student11").await;

    for (title, count) in [("Warmup", 1), ("Deep dive", 3)] {
        let (status, body) = generate(
            &ctx,
            &token,
            json!({"document_id": document_id, "num_questions": count, "method": "heuristic", "title": title, "seed": 4}),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "response: {body}");
    }

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/quizzes?min_questions=2&document_title=river",
            Some(&token),
            None,
        ))
        .await
        .expect("list quizzes");
    let list = test_support::read_json(response).await;
    assert_eq!(list["total_count"], 1);
    assert_eq!(list["items"][0]["title"], "Deep dive");
    let quiz_id = list["items"][0]["id"].as_str().expect("quiz id").to_string();

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/quizzes?created_after=yesterday",
            Some(&token),
            None,
        ))
        .await
        .expect("bad timestamp filter");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/v1/quizzes/{quiz_id}"),
            Some(&token),
            None,
        ))
        .await
        .expect("delete quiz");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = ctx
        .app
        .oneshot(test_support::json_request(Method::GET, "/api/v1/quizzes", Some(&token), None))
        .await
        .expect("list after delete");
    let list = test_support::read_json(response).await;
    assert_eq!(list["total_count"], 1);
    assert_eq!(list["items"][0]["title"], "Warmup");
}

#[tokio::test]
async fn generation_is_rate_limited_per_user() {
    let ctx = test_support::setup_test_context_with_env(&[("QUIZ_GENERATION_RATE_LIMIT", "1")]).await;
    let (token, document_id) = seed_owner(&ctx, "student12").await;
    let body = json!({"document_id": document_id, "num_questions": 1, "method": "heuristic"});

    let (status, _) = generate(&ctx, &token, body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = generate(&ctx, &token, body).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}
