//! Local stand-in for the Toffy backend.
//!
//! Calls never fail; each one waits a fixed artificial delay so the screens
//! show their loading states. State lives in an explicit [`MockSession`]
//! owned by the backend value.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::sleep;
use tracing::debug;

use toffy_flow::Subject;

use crate::catalog::{CatalogError, FALLBACK_PROBLEM, ProblemCatalog, ProblemQuestion};
use crate::plan::{DEFAULT_TRIAL_DAYS, PlanDay, plan_days};

/// Artificial latency per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockDelays {
    pub register: Duration,
    pub social_login: Duration,
    pub create_pet: Duration,
    pub update_pet: Duration,
    pub set_problem: Duration,
    pub questions: Duration,
    pub submit_assessment: Duration,
    pub diagnosis: Duration,
    pub plan: Duration,
}

impl Default for MockDelays {
    fn default() -> Self {
        let ms = Duration::from_millis;
        Self {
            register: ms(800),
            social_login: ms(600),
            create_pet: ms(500),
            update_pet: ms(300),
            set_problem: ms(300),
            questions: ms(400),
            submit_assessment: ms(1000),
            diagnosis: ms(800),
            plan: ms(600),
        }
    }
}

impl MockDelays {
    pub fn none() -> Self {
        Self {
            register: Duration::ZERO,
            social_login: Duration::ZERO,
            create_pet: Duration::ZERO,
            update_pet: Duration::ZERO,
            set_problem: Duration::ZERO,
            questions: Duration::ZERO,
            submit_assessment: Duration::ZERO,
            diagnosis: Duration::ZERO,
            plan: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pet {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub breed: String,
    #[serde(default)]
    pub age: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_problem: Option<String>,
}

impl Pet {
    pub fn subject(&self) -> Subject {
        Subject {
            name: self.name.clone(),
            breed: self.breed.clone(),
            age: self.age.clone(),
        }
    }
}

/// Fields sent when creating or updating a pet; `None` leaves a field alone.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PetUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(default)]
    pub age: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: String,
    pub pet_id: String,
    pub answers: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisSummary {
    pub problem: String,
    pub insight: String,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub estimated_days: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub id: String,
    pub pet_id: String,
    pub problem_id: String,
    pub days: Vec<PlanDay>,
    pub trial_days: u8,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MockSession {
    pub user: Option<User>,
    pub pet: Option<Pet>,
    pub assessment: Option<Assessment>,
}

#[derive(Debug, Clone)]
pub struct MockBackend {
    session: MockSession,
    delays: MockDelays,
    catalog: ProblemCatalog,
    trial_days: u8,
}

impl MockBackend {
    pub fn new() -> Result<Self, CatalogError> {
        Ok(Self::with_catalog(ProblemCatalog::builtin()?))
    }

    pub fn with_catalog(catalog: ProblemCatalog) -> Self {
        Self {
            session: MockSession::default(),
            delays: MockDelays::default(),
            catalog,
            trial_days: DEFAULT_TRIAL_DAYS,
        }
    }

    pub fn with_delays(mut self, delays: MockDelays) -> Self {
        self.delays = delays;
        self
    }

    pub fn with_trial_days(mut self, trial_days: u8) -> Self {
        self.trial_days = trial_days;
        self
    }

    pub fn session(&self) -> &MockSession {
        &self.session
    }

    pub fn catalog(&self) -> &ProblemCatalog {
        &self.catalog
    }

    fn sign_in(&mut self, email: &str, name: &str) -> User {
        let user = User {
            id: "user_1".into(),
            email: email.into(),
            name: name.into(),
        };
        self.session.user = Some(user.clone());
        user
    }

    pub async fn register(&mut self, email: &str, _password: &str, name: &str) -> User {
        sleep(self.delays.register).await;
        debug!(email, "registered user");
        self.sign_in(email, name)
    }

    pub async fn login_with_google(&mut self) -> User {
        sleep(self.delays.social_login).await;
        self.sign_in("user@gmail.com", "Demo User")
    }

    pub async fn login_with_apple(&mut self) -> User {
        sleep(self.delays.social_login).await;
        self.sign_in("user@icloud.com", "Demo User")
    }

    pub async fn create_pet(&mut self, draft: PetUpdate) -> Pet {
        sleep(self.delays.create_pet).await;
        let pet = Pet {
            id: "pet_1".into(),
            name: draft.name.unwrap_or_default(),
            breed: draft.breed.unwrap_or_default(),
            age: draft.age.unwrap_or_default(),
            primary_problem: None,
        };
        debug!(pet = %pet.name, "created pet");
        self.session.pet = Some(pet.clone());
        pet
    }

    /// Merges `update` into the session pet, creating one if none exists.
    pub async fn update_pet(&mut self, pet_id: &str, update: PetUpdate) -> Pet {
        sleep(self.delays.update_pet).await;
        let pet = self.session.pet.get_or_insert_with(|| Pet {
            id: pet_id.to_string(),
            ..Pet::default()
        });
        if let Some(name) = update.name {
            pet.name = name;
        }
        if let Some(breed) = update.breed {
            pet.breed = breed;
        }
        if let Some(age) = update.age {
            pet.age = age;
        }
        pet.clone()
    }

    pub async fn set_problem(&mut self, pet_id: &str, problem_id: &str) {
        sleep(self.delays.set_problem).await;
        debug!(pet_id, problem_id, "problem selected");
        let pet = self.session.pet.get_or_insert_with(|| Pet {
            id: pet_id.to_string(),
            ..Pet::default()
        });
        pet.primary_problem = Some(problem_id.to_string());
    }

    pub async fn get_questions(&self, problem_id: &str) -> Vec<ProblemQuestion> {
        sleep(self.delays.questions).await;
        self.catalog.questions_for(problem_id).to_vec()
    }

    pub async fn submit_assessment(&mut self, pet_id: &str, answers: Value) -> String {
        sleep(self.delays.submit_assessment).await;
        let assessment = Assessment {
            id: "assessment_1".into(),
            pet_id: pet_id.to_string(),
            answers,
        };
        let id = assessment.id.clone();
        self.session.assessment = Some(assessment);
        id
    }

    pub async fn get_diagnosis(&self, _pet_id: &str) -> DiagnosisSummary {
        sleep(self.delays.diagnosis).await;
        let pet = self.session.pet.as_ref();
        let problem = pet
            .and_then(|pet| pet.primary_problem.as_deref())
            .and_then(|id| self.catalog.find(id));
        let subject = pet.map(Pet::subject).unwrap_or_default();

        DiagnosisSummary {
            problem: problem
                .map(|problem| problem.label.clone())
                .unwrap_or_else(|| "Training".into()),
            insight: problem
                .map(|problem| problem.insight_for(&subject))
                .unwrap_or_else(|| "Your personalized plan is ready!".into()),
            strengths: vec!["Eager to learn".into(), "Good with treats".into()],
            improvements: vec!["Consistency needed".into(), "More outdoor time".into()],
            estimated_days: 7,
        }
    }

    pub async fn get_plan(&self, pet_id: &str) -> Plan {
        sleep(self.delays.plan).await;
        let pet = self.session.pet.as_ref();
        let problem_id = pet
            .and_then(|pet| pet.primary_problem.clone())
            .unwrap_or_else(|| FALLBACK_PROBLEM.to_string());
        let subject = pet.map(Pet::subject).unwrap_or_default();

        Plan {
            id: "plan_1".into(),
            pet_id: pet_id.to_string(),
            days: plan_days(&problem_id, subject.display_name()),
            problem_id,
            trial_days: self.trial_days,
        }
    }
}
