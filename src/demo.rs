//! Demo mode: synthetic accounts and an in-memory CRM dataset
//!
//! Used when the backend is unreachable. Writes made in demo mode change the
//! in-memory dataset only and are lost when the client is dropped.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use crate::auth::session::mint_demo_tokens;
use crate::auth::types::{AuthResponse, LoginCredentials, RegisterData, Role, User, UserId, UserSettings};
use crate::crm::types::*;
use crate::error::{Error, Result};
use crate::messages::{self, Language};

/// Password accepted by demo login
pub const DEMO_PASSWORD: &str = "demo123";

/// Email of the advertised demo account
pub const DEMO_EMAIL: &str = "demo@lawyer.com";

const DEMO_FULL_NAME: &str = "Dmytro Laposha";

/// Loose structural email check: one `@`, non-empty local part, dotted domain
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.contains(char::is_whitespace)
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Whether demo login accepts these credentials
pub fn accepts_demo_login(credentials: &LoginCredentials) -> bool {
    is_valid_email(&credentials.email) && credentials.password == DEMO_PASSWORD
}

fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Synthetic user record
pub fn demo_user(id: i64, email: &str, full_name: &str, role: Role, now: DateTime<Utc>) -> User {
    User {
        id: UserId::Numeric(id),
        email: email.trim().to_string(),
        full_name: full_name.to_string(),
        role,
        is_active: true,
        last_login: Some(timestamp(now)),
        created_at: Some("2024-01-01T00:00:00Z".to_string()),
        updated_at: Some(timestamp(now)),
        settings: UserSettings {
            phone: None,
            timezone: Some("Europe/Kyiv".to_string()),
            language: Some("uk".to_string()),
        },
    }
}

/// Log in against the demo account
pub fn demo_login(credentials: &LoginCredentials, now: DateTime<Utc>, lang: Language) -> Result<AuthResponse> {
    if !accepts_demo_login(credentials) {
        return Err(Error::auth(messages::invalid_credentials_message(lang)));
    }

    let (access_token, refresh_token) = mint_demo_tokens(now);
    Ok(AuthResponse {
        access_token,
        refresh_token: Some(refresh_token),
        token_type: Some("bearer".to_string()),
        expires_in: None,
        user: Some(demo_user(1, &credentials.email, DEMO_FULL_NAME, Role::Lawyer, now)),
    })
}

/// Register a synthetic account; any well-formed email is accepted
pub fn demo_register(data: &RegisterData, now: DateTime<Utc>) -> Result<AuthResponse> {
    if !is_valid_email(&data.email) {
        return Err(Error::auth(format!("invalid email: {}", data.email)));
    }

    let (access_token, refresh_token) = mint_demo_tokens(now);
    Ok(AuthResponse {
        access_token,
        refresh_token: Some(refresh_token),
        token_type: Some("bearer".to_string()),
        expires_in: None,
        user: Some(demo_user(
            now.timestamp_millis(),
            &data.email,
            &data.full_name,
            data.role,
            now,
        )),
    })
}

/// A mutable list of demo records
pub struct Collection<T> {
    items: RwLock<Vec<T>>,
}

impl<T: Record> Collection<T> {
    fn new(items: Vec<T>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }

    pub fn all(&self) -> Vec<T> {
        self.items.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn filtered<F: Fn(&T) -> bool>(&self, keep: F) -> Vec<T> {
        self.items
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|item| keep(item))
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &T::Id) -> Option<T> {
        self.items
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|item| item.id() == id)
            .cloned()
    }

    pub fn insert(&self, item: T) -> T {
        self.items
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(item.clone());
        item
    }

    /// Modify a record in place and return the new version
    pub fn update<F: FnOnce(&mut T)>(&self, id: &T::Id, change: F) -> Option<T> {
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        let item = items.iter_mut().find(|item| item.id() == id)?;
        change(item);
        Some(item.clone())
    }

    pub fn remove(&self, id: &T::Id) -> bool {
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        let before = items.len();
        items.retain(|item| item.id() != id);
        items.len() != before
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory CRM dataset served in demo mode
pub struct DemoStore {
    pub cases: Collection<Case>,
    pub clients: Collection<Client>,
    pub tasks: Collection<Task>,
    pub invoices: Collection<Invoice>,
    pub users: Collection<User>,
    last_id: AtomicI64,
}

impl Default for DemoStore {
    fn default() -> Self {
        Self::seeded()
    }
}

impl DemoStore {
    /// The canned dataset
    pub fn seeded() -> Self {
        Self {
            cases: Collection::new(seed_cases()),
            clients: Collection::new(seed_clients()),
            tasks: Collection::new(seed_tasks()),
            invoices: Collection::new(seed_invoices()),
            users: Collection::new(seed_users()),
            last_id: AtomicI64::new(0),
        }
    }

    /// Fresh record id: the current millisecond, bumped past the last one
    /// handed out
    pub fn next_id(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        now.max(previous + 1)
    }

    pub fn now(&self) -> String {
        timestamp(Utc::now())
    }

    pub fn client_name(&self, client_id: i64) -> Option<String> {
        self.clients.get(&client_id).map(|c| c.name)
    }

    /// Case counts per status, including statuses with no cases
    pub fn case_status_stats(&self) -> BTreeMap<String, u64> {
        let cases = self.cases.all();
        CaseStatus::ALL
            .iter()
            .map(|status| {
                let count = cases.iter().filter(|c| c.status == *status).count() as u64;
                (status.as_str().to_string(), count)
            })
            .collect()
    }

    /// Income from sent and paid invoices
    pub fn income_report(&self) -> IncomeReport {
        let billed: Vec<Invoice> = self
            .invoices
            .filtered(|i| matches!(i.status, InvoiceStatus::Paid | InvoiceStatus::Sent));
        let total_income: f64 = billed.iter().map(|i| i.amount).sum();
        let average_income = if billed.is_empty() {
            0.0
        } else {
            total_income / billed.len() as f64
        };

        IncomeReport {
            total_income,
            average_income,
            income_by_month: vec![
                MonthIncome {
                    month: "January 2024".to_string(),
                    income: total_income,
                },
                MonthIncome {
                    month: "December 2023".to_string(),
                    income: 18000.0,
                },
                MonthIncome {
                    month: "November 2023".to_string(),
                    income: 21000.0,
                },
            ],
            clients_count: self.clients.len() as u64,
            cases_count: self.cases.len() as u64,
        }
    }

    /// Budgeted hours per case
    pub fn time_report(&self) -> Value {
        let cases = self.cases.all();
        let rows: Vec<Value> = cases
            .iter()
            .filter_map(|c| {
                let rate = c.hourly_rate.filter(|r| *r > 0.0)?;
                let budget = c.budget?;
                Some(json!({
                    "case_id": c.id,
                    "case_number": c.case_number,
                    "hourly_rate": rate,
                    "budgeted_hours": (budget / rate * 10.0).round() / 10.0,
                }))
            })
            .collect();
        let total: f64 = rows
            .iter()
            .filter_map(|r| r["budgeted_hours"].as_f64())
            .sum();

        json!({
            "total_budgeted_hours": total,
            "cases": rows,
        })
    }

    /// Case counts by status and stage
    pub fn cases_report(&self) -> Value {
        let cases = self.cases.all();
        let mut by_stage: BTreeMap<String, u64> = BTreeMap::new();
        for case in &cases {
            let stage = serde_json::to_value(case.stage)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            *by_stage.entry(stage).or_default() += 1;
        }

        json!({
            "total": cases.len(),
            "by_status": self.case_status_stats(),
            "by_stage": by_stage,
        })
    }
}

fn seed_cases() -> Vec<Case> {
    vec![
        Case {
            id: 1,
            case_number: "CASE-001".to_string(),
            title: "Civil claim for debt recovery".to_string(),
            client_id: 1,
            client_name: Some("Ivan Petrenko".to_string()),
            status: CaseStatus::InProgress,
            stage: CaseStage::FirstInstance,
            due_date: Some("2024-10-15".to_string()),
            hourly_rate: Some(1500.0),
            budget: Some(25000.0),
            description: Some("Recovery of a loan agreement debt of 150,000 UAH.".to_string()),
            created_at: "2024-01-15T10:00:00Z".to_string(),
            updated_at: "2024-01-20T14:30:00Z".to_string(),
        },
        Case {
            id: 2,
            case_number: "CASE-002".to_string(),
            title: "Criminal fraud proceedings".to_string(),
            client_id: 2,
            client_name: Some("YurFirma LLC".to_string()),
            status: CaseStatus::Open,
            stage: CaseStage::PreTrial,
            due_date: Some("2024-11-20".to_string()),
            hourly_rate: Some(2000.0),
            budget: Some(50000.0),
            description: Some("Defending the company's interests in a fraud investigation.".to_string()),
            created_at: "2024-01-16T09:15:00Z".to_string(),
            updated_at: "2024-01-16T09:15:00Z".to_string(),
        },
        Case {
            id: 3,
            case_number: "CASE-003".to_string(),
            title: "Division of marital property".to_string(),
            client_id: 3,
            client_name: Some("Maria Kovalenko".to_string()),
            status: CaseStatus::OnHold,
            stage: CaseStage::Appeal,
            due_date: Some("2024-09-30".to_string()),
            hourly_rate: Some(1200.0),
            budget: Some(18000.0),
            description: Some("Division of jointly owned property after divorce.".to_string()),
            created_at: "2024-01-10T11:20:00Z".to_string(),
            updated_at: "2024-01-18T16:45:00Z".to_string(),
        },
    ]
}

fn seed_clients() -> Vec<Client> {
    vec![
        Client {
            id: 1,
            client_type: ClientType::Person,
            name: "Ivan Petrenko".to_string(),
            emails: vec![
                "ivan.petrenko@example.com".to_string(),
                "petrenko.i.s@gmail.com".to_string(),
            ],
            phones: vec!["+380501234567".to_string(), "+380441234567".to_string()],
            address: Some("Kyiv, Khreshchatyk St. 1, apt. 25".to_string()),
            kyc_status: KycStatus::Verified,
            notes: Some("Long-standing client in construction.".to_string()),
            created_at: "2024-01-15T10:00:00Z".to_string(),
            updated_at: "2024-01-15T10:00:00Z".to_string(),
        },
        Client {
            id: 2,
            client_type: ClientType::Company,
            name: "YurFirma LLC".to_string(),
            emails: vec![
                "info@jurfirma.ua".to_string(),
                "director@jurfirma.ua".to_string(),
            ],
            phones: vec!["+380442345678".to_string()],
            address: Some("Kyiv, Velyka Vasylkivska St. 72".to_string()),
            kyc_status: KycStatus::Verified,
            notes: Some("Law firm, working together since 2023.".to_string()),
            created_at: "2024-01-16T09:15:00Z".to_string(),
            updated_at: "2024-01-16T09:15:00Z".to_string(),
        },
        Client {
            id: 3,
            client_type: ClientType::Person,
            name: "Maria Kovalenko".to_string(),
            emails: vec!["maria.kovalenko@example.com".to_string()],
            phones: vec!["+380509876543".to_string()],
            address: Some("Kyiv, Saksahanskoho St. 45, apt. 12".to_string()),
            kyc_status: KycStatus::Pending,
            notes: Some("New client, needs a family law consultation.".to_string()),
            created_at: "2024-01-10T11:20:00Z".to_string(),
            updated_at: "2024-01-10T11:20:00Z".to_string(),
        },
    ]
}

fn seed_tasks() -> Vec<Task> {
    let assignee = Some(DEMO_FULL_NAME.to_string());
    vec![
        Task {
            id: 1,
            title: "Draft the statement of claim".to_string(),
            description: Some("Statement of claim for CASE-001 debt recovery".to_string()),
            priority: TaskPriority::High,
            status: TaskStatus::Todo,
            due_date: Some("2024-02-01".to_string()),
            assigned_to: assignee.clone(),
            case_id: Some(1),
            created_at: "2024-01-20T14:30:00Z".to_string(),
            updated_at: "2024-01-20T14:30:00Z".to_string(),
        },
        Task {
            id: 2,
            title: "Review case law".to_string(),
            description: Some("Analyse court practice in comparable fraud cases".to_string()),
            priority: TaskPriority::Medium,
            status: TaskStatus::InProgress,
            due_date: Some("2024-01-25".to_string()),
            assigned_to: assignee.clone(),
            case_id: Some(2),
            created_at: "2024-01-18T16:45:00Z".to_string(),
            updated_at: "2024-01-21T10:15:00Z".to_string(),
        },
        Task {
            id: 3,
            title: "Client consultation".to_string(),
            description: Some("Initial consultation with Maria Kovalenko on property division".to_string()),
            priority: TaskPriority::Low,
            status: TaskStatus::Done,
            due_date: Some("2024-01-15".to_string()),
            assigned_to: assignee.clone(),
            case_id: Some(3),
            created_at: "2024-01-10T11:20:00Z".to_string(),
            updated_at: "2024-01-15T15:30:00Z".to_string(),
        },
        Task {
            id: 4,
            title: "Prepare service agreement".to_string(),
            description: Some("Legal services agreement for YurFirma LLC".to_string()),
            priority: TaskPriority::Medium,
            status: TaskStatus::Todo,
            due_date: Some("2024-02-05".to_string()),
            assigned_to: assignee,
            case_id: Some(2),
            created_at: "2024-01-22T09:00:00Z".to_string(),
            updated_at: "2024-01-22T09:00:00Z".to_string(),
        },
    ]
}

fn seed_invoices() -> Vec<Invoice> {
    vec![
        Invoice {
            id: 1,
            number: "INV-2024-001".to_string(),
            client_id: 1,
            client_name: Some("Ivan Petrenko".to_string()),
            amount: 7500.0,
            status: InvoiceStatus::Paid,
            issue_date: "2024-01-20".to_string(),
            due_date: "2024-02-20".to_string(),
            description: Some("January 2024 services: consultations and document preparation".to_string()),
            created_at: "2024-01-20T14:30:00Z".to_string(),
            updated_at: "2024-01-25T11:20:00Z".to_string(),
        },
        Invoice {
            id: 2,
            number: "INV-2024-002".to_string(),
            client_id: 2,
            client_name: Some("YurFirma LLC".to_string()),
            amount: 15000.0,
            status: InvoiceStatus::Sent,
            issue_date: "2024-01-25".to_string(),
            due_date: "2024-02-25".to_string(),
            description: Some("Advance payment for the fraud proceedings".to_string()),
            created_at: "2024-01-25T16:15:00Z".to_string(),
            updated_at: "2024-01-25T16:15:00Z".to_string(),
        },
        Invoice {
            id: 3,
            number: "INV-2024-003".to_string(),
            client_id: 3,
            client_name: Some("Maria Kovalenko".to_string()),
            amount: 2000.0,
            status: InvoiceStatus::Draft,
            issue_date: "2024-01-15".to_string(),
            due_date: "2024-02-15".to_string(),
            description: Some("Initial family law consultation".to_string()),
            created_at: "2024-01-15T15:30:00Z".to_string(),
            updated_at: "2024-01-15T15:30:00Z".to_string(),
        },
    ]
}

fn seed_users() -> Vec<User> {
    let account = |id: i64, email: &str, full_name: &str, role: Role, created: &str| User {
        id: UserId::Numeric(id),
        email: email.to_string(),
        full_name: full_name.to_string(),
        role,
        is_active: true,
        last_login: None,
        created_at: Some(created.to_string()),
        updated_at: Some(created.to_string()),
        settings: UserSettings::default(),
    };

    vec![
        account(1, "admin@example.com", "System Administrator", Role::Admin, "2024-01-01T10:00:00Z"),
        account(2, "lawyer@example.com", "Ivan Petrenko", Role::Lawyer, "2024-01-02T10:00:00Z"),
        account(3, "assistant@example.com", "Maria Kovalenko", Role::Assistant, "2024-01-03T10:00:00Z"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::DEMO_TOKEN_PREFIX;

    #[test]
    fn test_email_check() {
        assert!(is_valid_email("x@y.com"));
        assert!(is_valid_email(" demo@lawyer.com "));
        assert!(!is_valid_email("x@y"));
        assert!(!is_valid_email("@y.com"));
        assert!(!is_valid_email("x@@y.com"));
        assert!(!is_valid_email("x y@z.com"));
        assert!(!is_valid_email("no-at-sign"));
    }

    #[test]
    fn test_demo_login_echoes_email() {
        let creds = LoginCredentials::new("x@y.com", DEMO_PASSWORD);
        let response = demo_login(&creds, Utc::now(), Language::En).unwrap();

        assert!(response.access_token.starts_with(DEMO_TOKEN_PREFIX));
        assert_eq!(response.user.unwrap().email, "x@y.com");
    }

    #[test]
    fn test_demo_login_rejects_wrong_password() {
        let creds = LoginCredentials::new("x@y.com", "hunter2");
        let err = demo_login(&creds, Utc::now(), Language::En).unwrap_err();
        assert_eq!(err.to_string(), "Authentication error: Invalid email or password");
    }

    #[test]
    fn test_demo_register_keeps_role() {
        let data = RegisterData {
            email: "new@firm.ua".to_string(),
            password: "whatever".to_string(),
            full_name: "New Hire".to_string(),
            role: Role::Paralegal,
        };
        let user = demo_register(&data, Utc::now()).unwrap().user.unwrap();
        assert_eq!(user.role, Role::Paralegal);
        assert_eq!(user.full_name, "New Hire");
    }

    #[test]
    fn test_next_id_is_unique() {
        let store = DemoStore::seeded();
        let a = store.next_id();
        let b = store.next_id();
        let c = store.next_id();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_collection_update_and_remove() {
        let store = DemoStore::seeded();
        let updated = store
            .tasks
            .update(&1, |t| t.status = TaskStatus::Done)
            .unwrap();
        assert_eq!(updated.status, TaskStatus::Done);
        assert_eq!(store.tasks.get(&1).unwrap().status, TaskStatus::Done);

        assert!(store.tasks.remove(&1));
        assert!(!store.tasks.remove(&1));
        assert!(store.tasks.update(&1, |_| {}).is_none());
    }

    #[test]
    fn test_reports() {
        let store = DemoStore::seeded();
        let income = store.income_report();
        assert_eq!(income.total_income, 22500.0);
        assert_eq!(income.average_income, 11250.0);
        assert_eq!(income.cases_count, 3);

        let stats = store.case_status_stats();
        assert_eq!(stats.len(), 5);
        assert_eq!(stats["open"], 1);
        assert_eq!(stats["archived"], 0);

        let cases = store.cases_report();
        assert_eq!(cases["total"], 3);
        assert_eq!(cases["by_stage"]["appeal"], 1);
    }
}
