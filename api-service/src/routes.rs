use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use schema::{
    Alert, Answers, Entity, Question, Student, Submission, Test, TestStatus,
    db::{DocumentStore, Filter, create_document, get_documents},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::info;
use validator::Validate;

use crate::{config::AppState, error::Error};

const MAX_LISTED_COLLECTIONS: usize = 20;

type Payload = Result<Json<Value>, JsonRejection>;

/// Extracts a `T` from the request body, or fails before anything is persisted.
fn parse<T>(payload: Payload) -> Result<T, Error>
where
    T: DeserializeOwned + Validate,
{
    let Json(value) = payload?;
    Ok(schema::parse(value)?)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateTestRequest {
    pub title: String,
    pub code: String,
    pub duration_minutes: i64,
    #[serde(default)]
    pub subject: Option<String>,
}

impl From<CreateTestRequest> for Test {
    fn from(request: CreateTestRequest) -> Self {
        Test {
            title: request.title,
            code: request.code,
            duration_minutes: request.duration_minutes,
            subject: request.subject,
            status: TestStatus::Upcoming,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AddQuestionsRequest {
    pub test_code: String,
    #[serde(deserialize_with = "schema::objects")]
    #[validate(nested)]
    pub questions: Vec<Question>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AssignStudentsRequest {
    pub test_code: String,
    #[serde(deserialize_with = "schema::objects")]
    #[validate(nested)]
    pub students: Vec<Student>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct JoinTestRequest {
    pub name: String,
    pub student_id: String,
    pub test_code: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SubmitRequest {
    pub test_code: String,
    pub student_id: String,
    #[serde(default)]
    pub answers: Answers,
    #[serde(default)]
    pub code: Option<String>,
}

pub async fn get_root() -> Json<Value> {
    Json(json!({"message": "RightTick backend is running"}))
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub backend: String,
    pub database: String,
    pub database_url: String,
    pub database_name: String,
    pub connection_status: String,
    pub collections: Vec<String>,
}

/// Reports database connectivity. Failures end up in the report, never in the status code.
pub async fn get_test(State(state): State<AppState>) -> Json<HealthReport> {
    let mut report = HealthReport {
        backend: "✅ Running".to_string(),
        database: "❌ Not Available".to_string(),
        database_url: "❌ Not Set".to_string(),
        database_name: "❌ Not Set".to_string(),
        connection_status: "Not Connected".to_string(),
        collections: vec![],
    };

    let Some(store) = state.store.as_deref() else {
        report.database = "⚠️ Database not initialized".to_string();
        return Json(report);
    };

    report.database = "✅ Connected".to_string();
    if state.env_vars.database_url.is_some() {
        report.database_url = "✅ Set".to_string();
    }
    report.database_name = store.name().to_string();
    report.connection_status = "Connected".to_string();

    match store.list_collection_names().await {
        Ok(mut names) => {
            names.truncate(MAX_LISTED_COLLECTIONS);
            report.collections = names;
        }
        Err(e) => {
            report.database = format!(
                "⚠️ Connected but error listing collections: {}",
                truncate(&e.to_string(), 60)
            );
        }
    }

    Json(report)
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

pub async fn post_admin_tests(
    State(state): State<AppState>,
    payload: Payload,
) -> Result<Json<Value>, Error> {
    let test = Test::from(parse::<CreateTestRequest>(payload)?);
    test.validate().map_err(schema::ValidationError::from)?;

    let id = create_document(state.store()?, Test::COLLECTION, &test).await?;
    info!(%id, code = %test.code, "test created");
    Ok(Json(json!({"ok": true, "id": id})))
}

/// Inserts each question on its own. A failure part way leaves earlier questions stored.
pub async fn post_admin_questions(
    State(state): State<AppState>,
    payload: Payload,
) -> Result<Json<Value>, Error> {
    let request: AddQuestionsRequest = parse(payload)?;
    let store = state.store()?;

    let ids = insert_each(store, &request.questions).await?;
    info!(test_code = %request.test_code, num = ids.len(), "questions added");
    Ok(Json(json!({"ok": true, "count": ids.len(), "ids": ids})))
}

/// Same partial-insert behavior as [`post_admin_questions`].
pub async fn post_admin_assign(
    State(state): State<AppState>,
    payload: Payload,
) -> Result<Json<Value>, Error> {
    let request: AssignStudentsRequest = parse(payload)?;
    let store = state.store()?;

    let ids = insert_each(store, &request.students).await?;
    info!(test_code = %request.test_code, num = ids.len(), "students assigned");
    Ok(Json(json!({"ok": true, "count": ids.len()})))
}

async fn insert_each<T: Entity>(store: &dyn DocumentStore, entities: &[T]) -> Result<Vec<String>, Error> {
    let mut ids = Vec::with_capacity(entities.len());
    for entity in entities {
        ids.push(create_document(store, T::COLLECTION, entity).await?);
    }
    Ok(ids)
}

pub async fn get_admin_tests(State(state): State<AppState>) -> Result<Json<Value>, Error> {
    let items = get_documents(state.store()?, Test::COLLECTION, None).await?;
    Ok(Json(json!({"ok": true, "items": items})))
}

/// Creates a new student document on every join, even for a known `student_id`.
pub async fn post_student_join(
    State(state): State<AppState>,
    payload: Payload,
) -> Result<Json<Value>, Error> {
    let request: JoinTestRequest = parse(payload)?;
    let student = Student::new(request.name, request.student_id);
    student.validate().map_err(schema::ValidationError::from)?;

    let id = create_document(state.store()?, Student::COLLECTION, &student).await?;
    info!(
        student_id = %student.student_id,
        test_code = %request.test_code,
        "student joined"
    );
    Ok(Json(json!({"ok": true, "student_doc": id})))
}

/// Questions for a test, without their `answer` field.
pub async fn get_student_questions(
    State(state): State<AppState>,
    Path(test_code): Path<String>,
) -> Result<Json<Value>, Error> {
    let filter = Filter::new().eq("test_code", test_code);
    let mut items = get_documents(state.store()?, Question::COLLECTION, Some(&filter)).await?;
    for item in items.iter_mut() {
        item.remove("answer");
    }
    Ok(Json(json!({"ok": true, "items": items})))
}

pub async fn post_student_submit(
    State(state): State<AppState>,
    payload: Payload,
) -> Result<Json<Value>, Error> {
    let request: SubmitRequest = parse(payload)?;
    let submission = Submission {
        test_code: request.test_code,
        student_id: request.student_id,
        answers: request.answers,
        code: request.code,
        score: None,
        coding_accuracy: None,
    };

    let id = create_document(state.store()?, Submission::COLLECTION, &submission).await?;
    info!(%id, test_code = %submission.test_code, "submission received");
    Ok(Json(json!({"ok": true, "submission_id": id})))
}

pub async fn post_alert(
    State(state): State<AppState>,
    payload: Payload,
) -> Result<Json<Value>, Error> {
    let alert: Alert = parse(payload)?;

    let id = create_document(state.store()?, Alert::COLLECTION, &alert).await?;
    info!(
        %id,
        test_code = %alert.test_code,
        student_id = %alert.student_id,
        kind = ?alert.kind,
        severity = ?alert.severity,
        "alert received"
    );
    Ok(Json(json!({"ok": true, "alert_id": id})))
}

pub async fn get_alerts(
    State(state): State<AppState>,
    Path(test_code): Path<String>,
) -> Result<Json<Value>, Error> {
    let filter = Filter::new().eq("test_code", test_code);
    let items = get_documents(state.store()?, Alert::COLLECTION, Some(&filter)).await?;
    Ok(Json(json!({"ok": true, "items": items})))
}
