#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use tempfile::TempDir;

use session::registry::SessionRegistry;
use session::store::yaml_store::YamlFileStore;
use trainer::catalog::{Language, TrainingCatalog};
use trainer::config::DatabaseFiles;
use trainer::database::TrainingDatabase;
use trainer::orchestrator::{LifecycleOrchestrator, TrainingRequest};
use trainer::services::{ContentService, InstantiationService, ServiceError};
use trainer::users::User;

pub const USER: &str = "trainee01";
pub const SCENARIO: &str = "Incident Response";
pub const LEVEL: &str = "Level 1 (Easy)";

/// Content service double. Activity ids are `act-<call number>`.
#[derive(Default)]
pub struct MockContent {
    pub upload_calls: AtomicUsize,
    pub remove_calls: AtomicUsize,
    /// 1-based upload call that is rejected.
    pub fail_upload_on_call: Option<usize>,
    pub fail_remove: bool,
    pub uploaded: Mutex<Vec<String>>,
    pub removed: Mutex<Vec<String>>,
}

impl MockContent {
    pub fn failing_upload_on(call: usize) -> Self {
        Self {
            fail_upload_on_call: Some(call),
            ..Self::default()
        }
    }

    pub fn uploads(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn removals(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentService for MockContent {
    async fn upload(&self, _user: &str, content: &str, _range_id: &str) -> Result<String, ServiceError> {
        let call = self.upload_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_upload_on_call == Some(call) {
            return Err(ServiceError::Rejected("content quota exceeded".into()));
        }
        self.uploaded.lock().push(content.to_string());
        Ok(format!("act-{call}"))
    }

    async fn remove(&self, _user: &str, _range_id: &str, activity_id: &str) -> Result<(), ServiceError> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_remove {
            return Err(ServiceError::Rejected("activity locked".into()));
        }
        self.removed.lock().push(activity_id.to_string());
        Ok(())
    }
}

/// Instantiation service double.
#[derive(Default)]
pub struct MockInstantiation {
    pub instantiate_calls: AtomicUsize,
    pub destroy_calls: AtomicUsize,
    pub fail_instantiate: bool,
    pub fail_destroy: bool,
    pub log: String,
    pub range_docs: Mutex<Vec<String>>,
    pub progressions: Mutex<Vec<Option<String>>>,
}

impl MockInstantiation {
    pub fn with_log(log: String) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    pub fn instantiations(&self) -> usize {
        self.instantiate_calls.load(Ordering::SeqCst)
    }

    pub fn destroys(&self) -> usize {
        self.destroy_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InstantiationService for MockInstantiation {
    async fn instantiate(
        &self,
        _user: &str,
        range_doc: &str,
        _range_id: &str,
        progression: Option<&str>,
    ) -> Result<String, ServiceError> {
        self.instantiate_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_instantiate {
            return Err(ServiceError::Rejected("no free hosts".into()));
        }
        self.range_docs.lock().push(range_doc.to_string());
        self.progressions.lock().push(progression.map(str::to_string));
        Ok("Range created.".into())
    }

    async fn destroy(&self, _user: &str, _range_id: &str) -> Result<(), ServiceError> {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_destroy {
            return Err(ServiceError::Rejected("range busy".into()));
        }
        Ok(())
    }

    async fn creation_log(&self, _user: &str, _range_id: &str) -> Result<String, ServiceError> {
        Ok(self.log.clone())
    }
}

const USERS: &str = "\
- users:
  - name: Trainee One
    id: trainee01
    password: 5e884898da28047151d0e56f8dc6292773603d0d
    host_mgmt_addr: 10.0.0.1
    host_account: cyuser
  - name: Trainee Two
    id: trainee02
";

const CATALOG_EN: &str = "\
- types:
  - name: Scenario-Based Training
    category: NIST Cybersecurity Framework
- scenarios:
  - name: Incident Response
    levels:
    - name: Level 1 (Easy)
      content: content/ir-easy.yml
      range: range/ir-easy.yml
      progression: ir-easy
    - name: Level 2 (Medium)
      content: content/ir-medium.yml
  - name: Forensics
    levels:
    - name: Level 1 (Easy)
      content: content/forensics.yml
      specification: range/forensics.yml
";

const CONTENT: &str = "\
- training:
  - id: 1
    title: Banner check
    questions:
    - id: 1
      body: The banner reads $guestA,0,v1
      meta_answer: ${guestA,0,flag}
";

const RANGE: &str = "\
host:
  mgmt_addr: {{ host_mgmt_addr }}
  virbr_addr: {{ host_virbr_addr }}
  account: {{ host_account }}
clone:
  range_id: {{ clone_range_id }}
  instance_number: {{ clone_instance_number }}
";

/// Creation-log reply carrying `lines` in its encoded message.
pub fn creation_log(lines: &[&str]) -> String {
    let body = utf8_percent_encode(&lines.join("\n"), NON_ALPHANUMERIC).to_string();
    format!(r#"[{{"status": "SUCCESS", "message": "{body}"}}]"#)
}

/// Answers for `count` instances: `v1` = `answer-<n>`, `flag` = `FLAG-<n>`.
pub fn answer_log(count: u32) -> String {
    let lines: Vec<String> = (1..=count)
        .flat_map(|n| {
            [
                format!("exec-result: ins{n},guestA,0,v1 answer-{n}"),
                format!("exec-result: ins{n},guestA,0,flag FLAG-{n}"),
            ]
        })
        .collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    creation_log(&refs)
}

pub fn write_database(dir: &Path) {
    std::fs::create_dir_all(dir.join("content")).unwrap();
    std::fs::create_dir_all(dir.join("range")).unwrap();
    std::fs::write(dir.join("users.yml"), USERS).unwrap();
    std::fs::write(dir.join("training-en.yml"), CATALOG_EN).unwrap();
    std::fs::write(dir.join("content/ir-easy.yml"), CONTENT).unwrap();
    std::fs::write(dir.join("range/ir-easy.yml"), RANGE).unwrap();
    std::fs::write(dir.join("content/forensics.yml"), CONTENT).unwrap();
}

pub struct Harness {
    pub dir: TempDir,
    pub db: TrainingDatabase,
    pub content: Arc<MockContent>,
    pub instantiation: Arc<MockInstantiation>,
    pub active: Arc<SessionRegistry>,
    pub saved: Arc<SessionRegistry>,
    pub orchestrator: Arc<LifecycleOrchestrator>,
}

impl Harness {
    pub fn new(content: MockContent, instantiation: MockInstantiation) -> Self {
        Self::with_max(content, instantiation, 100)
    }

    pub fn with_max(content: MockContent, instantiation: MockInstantiation, max_sessions: u32) -> Self {
        let dir = TempDir::new().unwrap();
        write_database(dir.path());

        let files = DatabaseFiles::default();
        let db = TrainingDatabase::new(dir.path(), files.clone());
        let active = Arc::new(SessionRegistry::new(
            "active_sessions",
            Arc::new(YamlFileStore::new(dir.path().join(&files.active_sessions))),
        ));
        let saved = Arc::new(SessionRegistry::new(
            "saved_configurations",
            Arc::new(YamlFileStore::new(dir.path().join(&files.saved_configurations))),
        ));

        let content = Arc::new(content);
        let instantiation = Arc::new(instantiation);
        let orchestrator = Arc::new(LifecycleOrchestrator::new(
            db.clone(),
            active.clone(),
            saved.clone(),
            content.clone(),
            instantiation.clone(),
            max_sessions,
        ));

        Self {
            dir,
            db,
            content,
            instantiation,
            active,
            saved,
            orchestrator,
        }
    }

    pub async fn catalog(&self) -> TrainingCatalog {
        self.db.catalog(Language::En).await.unwrap()
    }

    pub async fn user(&self, id: &str) -> User {
        self.db.users().await.unwrap().get(id).unwrap().clone()
    }

    pub async fn request(&self, count: u32, scenario: &str, level: &str) -> TrainingRequest {
        let params = [
            ("count", count.to_string()),
            ("type", "Scenario-Based Training".to_string()),
            ("scenario", scenario.to_string()),
            ("level", level.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        TrainingRequest::from_params(self.user(USER).await, Language::En, &params).unwrap()
    }
}
