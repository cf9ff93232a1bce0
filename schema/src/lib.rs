//! RightTick document schemas
//!
//! Each entity below is stored in its own collection, named by `Entity::COLLECTION`.
//! Relationships between entities are by shared string values (`test_code`,
//! `student_id`) and are not enforced.
use std::{collections::BTreeMap, fmt, marker::PhantomData};

use serde::{
    Deserialize, Deserializer, Serialize,
    de::{DeserializeOwned, MapAccess, Visitor, value::MapAccessDeserializer},
};
use validator::Validate;

pub mod db;
pub mod error;
pub mod memory;

pub use error::{PersistenceError, ValidationError};

/// An entity persisted one document per instance.
pub trait Entity: Serialize + DeserializeOwned + Validate + Send + Sync {
    const COLLECTION: &'static str;
}

/// Builds a typed value from an untyped request payload.
///
/// Shape is checked first (an object, presence, types, enum sets, unknown
/// fields), then range constraints.
pub fn parse<T>(payload: serde_json::Value) -> Result<T, ValidationError>
where
    T: DeserializeOwned + Validate,
{
    let Object(value) = serde_path_to_error::deserialize::<_, Object<T>>(payload)?;
    value.validate()?;
    Ok(value)
}

/// A `T` read only from a map. Derived struct impls also accept a sequence,
/// matching fields by position; this does not.
#[derive(Debug)]
pub struct Object<T>(pub T);

impl<'de, T> Deserialize<'de> for Object<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ObjectVisitor<T>(PhantomData<T>);

        impl<'de, T> Visitor<'de> for ObjectVisitor<T>
        where
            T: Deserialize<'de>,
        {
            type Value = T;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an object")
            }

            fn visit_map<A>(self, map: A) -> Result<T, A::Error>
            where
                A: MapAccess<'de>,
            {
                T::deserialize(MapAccessDeserializer::new(map))
            }
        }

        deserializer
            .deserialize_map(ObjectVisitor(PhantomData))
            .map(Object)
    }
}

/// `deserialize_with` for lists of entities: every item must be an object.
pub fn objects<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let items: Vec<Object<T>> = Vec::deserialize(deserializer)?;
    Ok(items.into_iter().map(|Object(item)| item).collect())
}

/// Free-form answers keyed by question. Keys and values are unconstrained.
pub type Answers = BTreeMap<String, serde_json::Value>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Student {
    pub name: String,
    /// Institute roll / registration number
    pub student_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default = "default_integrity_score")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub integrity_score: f64,
}

fn default_integrity_score() -> f64 {
    100.0
}

impl Student {
    pub fn new(name: impl Into<String>, student_id: impl Into<String>) -> Self {
        Student {
            name: name.into(),
            student_id: student_id.into(),
            email: None,
            avatar_url: None,
            integrity_score: default_integrity_score(),
        }
    }
}

impl Entity for Student {
    const COLLECTION: &'static str = "student";
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    #[default]
    Upcoming,
    Ongoing,
    Completed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Test {
    pub title: String,
    /// Join code shared with students
    pub code: String,
    #[validate(range(min = 5, max = 300))]
    pub duration_minutes: i64,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub status: TestStatus,
}

impl Entity for Test {
    const COLLECTION: &'static str = "test";
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Mcq,
    Coding,
    Theory,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Question {
    pub test_code: String,
    pub qtype: QuestionType,
    pub title: String,
    pub prompt: String,
    // Not required for `mcq`
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub topic: Option<String>,
}

impl Entity for Question {
    const COLLECTION: &'static str = "question";
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Submission {
    pub test_code: String,
    pub student_id: String,
    #[serde(default)]
    pub answers: Answers,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub coding_accuracy: Option<f64>,
}

impl Entity for Submission {
    const COLLECTION: &'static str = "submission";
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    EyeMovement,
    TabChange,
    KeyboardToggle,
    FaceMissing,
    Other,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
}

/// Integrity event pushed by the proctoring client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Alert {
    pub test_code: String,
    pub student_id: String,
    pub kind: AlertKind,
    #[serde(default)]
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub snapshot_url: Option<String>,
}

impl Entity for Alert {
    const COLLECTION: &'static str = "alert";
}

/// Analytics record. Nothing writes these yet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct IntegrityMetric {
    pub test_code: String,
    pub student_id: String,
    #[validate(range(min = 0.0, max = 100.0))]
    pub score: f64,
}

impl Entity for IntegrityMetric {
    const COLLECTION: &'static str = "integrity_metric";
}
