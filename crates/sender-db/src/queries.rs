use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};
use uuid::Uuid;

use sender_types::models::{
    BroadcastLog, Contact, MessengerAccount, PlanId, Role, SubscriptionPlan, Template, User,
};

use crate::Database;
use crate::models::{
    BroadcastLogRow, ContactRow, MessengerAccountRow, PlanRow, TemplateRow, UserRow,
    format_timestamp,
};

const USER_COLUMNS: &str = "id, email, username, password_hash, role, subscription_plan, \
     is_unlimited, messages_sent_this_month, token_epoch, created_at, updated_at";

/// Result of an insert guarded by a UNIQUE constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

impl Database {
    // -- Users --

    /// Insert a user. A clash on email or username yields `Duplicate`, not an error.
    pub fn insert_user(&self, user: &User) -> Result<InsertOutcome> {
        self.with_conn_mut(|conn| {
            let res = conn.execute(
                &format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
                rusqlite::params![
                    user.id.to_string(),
                    user.email,
                    user.username,
                    user.password_hash,
                    user.role.as_str(),
                    user.subscription_plan.as_str(),
                    user.is_unlimited,
                    user.messages_sent_this_month,
                    user.token_epoch,
                    format_timestamp(user.created_at),
                    format_timestamp(user.updated_at),
                ],
            );

            match res {
                Ok(_) => Ok(InsertOutcome::Inserted),
                Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::Duplicate),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row = self.with_conn(|conn| {
            query_user(conn, &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"), &id.to_string())
        })?;
        row.map(User::try_from).transpose()
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = self.with_conn(|conn| {
            query_user(conn, &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"), email)
        })?;
        row.map(User::try_from).transpose()
    }

    /// True if either the email or the username is already registered.
    pub fn user_exists(&self, email: &str, username: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1 OR username = ?2)",
                [email, username],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    pub fn admin_exists(&self) -> Result<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE role = ?1)",
                [Role::Admin.as_str()],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    pub fn list_users(&self, limit: u32) -> Result<Vec<User>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY created_at, rowid LIMIT ?1"
            ))?;
            let rows = stmt
                .query_map([limit], map_user_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(User::try_from).collect()
    }

    /// Returns false if no user has this id.
    pub fn set_subscription_plan(&self, id: Uuid, plan: PlanId, now: DateTime<Utc>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET subscription_plan = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![plan.as_str(), format_timestamp(now), id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }

    /// Returns false if no user has this id.
    pub fn set_unlimited(&self, id: Uuid, is_unlimited: bool, now: DateTime<Utc>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET is_unlimited = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![is_unlimited, format_timestamp(now), id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }

    /// Invalidate every token issued so far for this user. Returns the new epoch.
    pub fn bump_token_epoch(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<i64>> {
        self.with_conn_mut(|conn| {
            let epoch = conn
                .query_row(
                    "UPDATE users SET token_epoch = token_epoch + 1, updated_at = ?1
                     WHERE id = ?2 RETURNING token_epoch",
                    rusqlite::params![format_timestamp(now), id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(epoch)
        })
    }

    // -- Messenger accounts --

    pub fn insert_messenger_account(&self, account: &MessengerAccount) -> Result<()> {
        let session_data = serde_json::to_string(&account.session_data)?;
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messenger_accounts
                    (id, user_id, messenger_type, account_name, session_data, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    account.id.to_string(),
                    account.user_id.to_string(),
                    account.messenger_type.as_str(),
                    account.account_name,
                    session_data,
                    account.is_active,
                    format_timestamp(account.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn list_messenger_accounts(&self, user_id: Uuid, limit: u32) -> Result<Vec<MessengerAccount>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, messenger_type, account_name, session_data, is_active, created_at
                 FROM messenger_accounts
                 WHERE user_id = ?1
                 ORDER BY created_at, rowid
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![user_id.to_string(), limit], |row| {
                    Ok(MessengerAccountRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        messenger_type: row.get(2)?,
                        account_name: row.get(3)?,
                        session_data: row.get(4)?,
                        is_active: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(MessengerAccount::try_from).collect()
    }

    // -- Templates --

    pub fn insert_template(&self, template: &Template) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO templates (id, user_id, name, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    template.id.to_string(),
                    template.user_id.to_string(),
                    template.name,
                    template.content,
                    format_timestamp(template.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn list_templates(&self, user_id: Uuid, limit: u32) -> Result<Vec<Template>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, name, content, created_at
                 FROM templates
                 WHERE user_id = ?1
                 ORDER BY created_at, rowid
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![user_id.to_string(), limit], |row| {
                    Ok(TemplateRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        name: row.get(2)?,
                        content: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(Template::try_from).collect()
    }

    // -- Contacts --

    pub fn insert_contact(&self, contact: &Contact) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO contacts (id, user_id, name, phone, telegram_username, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    contact.id.to_string(),
                    contact.user_id.to_string(),
                    contact.name,
                    contact.phone,
                    contact.telegram_username,
                    format_timestamp(contact.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn list_contacts(&self, user_id: Uuid, limit: u32) -> Result<Vec<Contact>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, name, phone, telegram_username, created_at
                 FROM contacts
                 WHERE user_id = ?1
                 ORDER BY created_at, rowid
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![user_id.to_string(), limit], |row| {
                    Ok(ContactRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        name: row.get(2)?,
                        phone: row.get(3)?,
                        telegram_username: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(Contact::try_from).collect()
    }

    // -- Broadcast logs --

    pub fn insert_broadcast_log(&self, log: &BroadcastLog) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO broadcast_logs
                    (id, user_id, messenger_type, total_contacts, successful_sends,
                     failed_sends, status, created_at, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    log.id.to_string(),
                    log.user_id.to_string(),
                    log.messenger_type.as_str(),
                    log.total_contacts,
                    log.successful_sends,
                    log.failed_sends,
                    log.status.as_str(),
                    format_timestamp(log.created_at),
                    log.completed_at.map(format_timestamp),
                ],
            )?;
            Ok(())
        })
    }

    pub fn list_broadcast_logs(&self, user_id: Uuid, limit: u32) -> Result<Vec<BroadcastLog>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, messenger_type, total_contacts, successful_sends,
                        failed_sends, status, created_at, completed_at
                 FROM broadcast_logs
                 WHERE user_id = ?1
                 ORDER BY created_at, rowid
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![user_id.to_string(), limit], |row| {
                    Ok(BroadcastLogRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        messenger_type: row.get(2)?,
                        total_contacts: row.get(3)?,
                        successful_sends: row.get(4)?,
                        failed_sends: row.get(5)?,
                        status: row.get(6)?,
                        created_at: row.get(7)?,
                        completed_at: row.get(8)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(BroadcastLog::try_from).collect()
    }

    // -- Subscription plans --

    /// Every known plan in tier order.
    pub fn list_plans(&self) -> Result<Vec<(PlanId, SubscriptionPlan)>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, name, message_limit, price, version FROM subscription_plans")?;
            let rows = stmt
                .query_map([], map_plan_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        let mut plans = rows
            .into_iter()
            .map(|row| Ok((row.id.parse::<PlanId>()?, SubscriptionPlan::from(row))))
            .collect::<Result<Vec<_>>>()?;
        plans.sort_by_key(|(id, _)| *id);
        Ok(plans)
    }

    /// Current row for a plan, including its CAS version.
    pub fn get_plan(&self, id: PlanId) -> Result<Option<PlanRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, message_limit, price, version FROM subscription_plans WHERE id = ?1",
                [id.as_str()],
                map_plan_row,
            )
            .optional()
        })
    }

    /// Set the price only if the row is still at `expected_version`.
    /// Returns false when another writer got there first.
    pub fn compare_and_set_plan_price(&self, id: PlanId, expected_version: i64, price: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE subscription_plans SET price = ?1, version = version + 1
                 WHERE id = ?2 AND version = ?3",
                rusqlite::params![price, id.as_str(), expected_version],
            )?;
            Ok(changed == 1)
        })
    }
}

fn map_user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        password_hash: row.get(3)?,
        role: row.get(4)?,
        subscription_plan: row.get(5)?,
        is_unlimited: row.get(6)?,
        messages_sent_this_month: row.get(7)?,
        token_epoch: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn map_plan_row(row: &Row<'_>) -> rusqlite::Result<PlanRow> {
    Ok(PlanRow {
        id: row.get(0)?,
        name: row.get(1)?,
        message_limit: row.get(2)?,
        price: row.get(3)?,
        version: row.get(4)?,
    })
}

fn query_user(conn: &Connection, sql: &str, key: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(sql)?;
    let row = stmt.query_row([key], map_user_row).optional()?;
    Ok(row)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::timestamp_now;
    use sender_types::models::{BroadcastStatus, MessengerType};

    fn user(email: &str, username: &str) -> User {
        let now = timestamp_now();
        User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            username: username.to_string(),
            password_hash: "$argon2id$fake".to_string(),
            role: Role::User,
            subscription_plan: PlanId::Free,
            is_unlimited: false,
            messages_sent_this_month: 0,
            token_epoch: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn duplicate_email_or_username_is_reported() {
        let db = Database::open_in_memory().unwrap();
        let alice = user("a@x.com", "alice");
        assert_eq!(db.insert_user(&alice).unwrap(), InsertOutcome::Inserted);

        let same_email = user("a@x.com", "alice2");
        assert_eq!(db.insert_user(&same_email).unwrap(), InsertOutcome::Duplicate);
        let same_name = user("other@x.com", "alice");
        assert_eq!(db.insert_user(&same_name).unwrap(), InsertOutcome::Duplicate);

        let stored = db.get_user_by_email("a@x.com").unwrap().unwrap();
        assert_eq!(stored.id, alice.id);
        assert_eq!(stored.username, "alice");
        assert_eq!(db.list_users(100).unwrap().len(), 1);
        assert!(db.user_exists("nobody@x.com", "alice").unwrap());
        assert!(!db.user_exists("nobody@x.com", "nobody").unwrap());
    }

    #[test]
    fn user_mutations_report_missing_rows() {
        let db = Database::open_in_memory().unwrap();
        let alice = user("a@x.com", "alice");
        db.insert_user(&alice).unwrap();

        assert!(db.set_subscription_plan(alice.id, PlanId::Basic, timestamp_now()).unwrap());
        assert!(db.set_unlimited(alice.id, true, timestamp_now()).unwrap());
        assert_eq!(db.bump_token_epoch(alice.id, timestamp_now()).unwrap(), Some(1));

        let stored = db.get_user_by_id(alice.id).unwrap().unwrap();
        assert_eq!(stored.subscription_plan, PlanId::Basic);
        assert!(stored.is_unlimited);
        assert_eq!(stored.token_epoch, 1);

        let ghost = Uuid::new_v4();
        assert!(!db.set_subscription_plan(ghost, PlanId::Basic, timestamp_now()).unwrap());
        assert!(!db.set_unlimited(ghost, true, timestamp_now()).unwrap());
        assert_eq!(db.bump_token_epoch(ghost, timestamp_now()).unwrap(), None);
    }

    #[test]
    fn admin_exists_tracks_role() {
        let db = Database::open_in_memory().unwrap();
        assert!(!db.admin_exists().unwrap());

        let mut admin = user("admin@sender.app", "admin");
        admin.role = Role::Admin;
        db.insert_user(&admin).unwrap();
        assert!(db.admin_exists().unwrap());
    }

    #[test]
    fn resource_lists_are_scoped_to_owner() {
        let db = Database::open_in_memory().unwrap();
        let alice = user("a@x.com", "alice");
        let bob = user("b@x.com", "bob");
        db.insert_user(&alice).unwrap();
        db.insert_user(&bob).unwrap();

        let template = Template {
            id: Uuid::new_v4(),
            user_id: alice.id,
            name: "greeting".into(),
            content: "hello".into(),
            created_at: timestamp_now(),
        };
        db.insert_template(&template).unwrap();

        let contact = Contact {
            id: Uuid::new_v4(),
            user_id: bob.id,
            name: "Ivan".into(),
            phone: Some("+79001234567".into()),
            telegram_username: None,
            created_at: timestamp_now(),
        };
        db.insert_contact(&contact).unwrap();

        let mut session = serde_json::Map::new();
        session.insert("dc".into(), serde_json::json!(2));
        let account = MessengerAccount {
            id: Uuid::new_v4(),
            user_id: alice.id,
            messenger_type: MessengerType::Telegram,
            account_name: "main".into(),
            session_data: session,
            is_active: true,
            created_at: timestamp_now(),
        };
        db.insert_messenger_account(&account).unwrap();

        assert_eq!(db.list_templates(alice.id, 100).unwrap(), vec![template]);
        assert!(db.list_templates(bob.id, 100).unwrap().is_empty());
        assert_eq!(db.list_contacts(bob.id, 100).unwrap(), vec![contact]);
        assert!(db.list_contacts(alice.id, 100).unwrap().is_empty());
        assert_eq!(db.list_messenger_accounts(alice.id, 100).unwrap(), vec![account]);
    }

    #[test]
    fn broadcast_logs_read_back_with_status() {
        let db = Database::open_in_memory().unwrap();
        let alice = user("a@x.com", "alice");
        db.insert_user(&alice).unwrap();

        let log = BroadcastLog {
            id: Uuid::new_v4(),
            user_id: alice.id,
            messenger_type: MessengerType::Whatsapp,
            total_contacts: 10,
            successful_sends: 9,
            failed_sends: 1,
            status: BroadcastStatus::Completed,
            created_at: timestamp_now(),
            completed_at: Some(timestamp_now()),
        };
        db.insert_broadcast_log(&log).unwrap();

        let logs = db.list_broadcast_logs(alice.id, 100).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, BroadcastStatus::Completed);
        assert_eq!(logs[0].failed_sends, 1);
    }

    #[test]
    fn list_limit_is_honored() {
        let db = Database::open_in_memory().unwrap();
        let alice = user("a@x.com", "alice");
        db.insert_user(&alice).unwrap();

        for i in 0..5 {
            db.insert_template(&Template {
                id: Uuid::new_v4(),
                user_id: alice.id,
                name: format!("t{i}"),
                content: String::new(),
                created_at: timestamp_now(),
            })
            .unwrap();
        }

        let names: Vec<String> = db
            .list_templates(alice.id, 3)
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["t0", "t1", "t2"]);
    }

    #[test]
    fn seeded_plans_come_back_in_tier_order() {
        let db = Database::open_in_memory().unwrap();
        let plans = db.list_plans().unwrap();

        let ids: Vec<PlanId> = plans.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, PlanId::ALL.to_vec());
        assert_eq!(plans[1].1.price, 999);
        assert_eq!(plans[4].1.message_limit, -1);
    }

    #[test]
    fn plan_price_cas_rejects_stale_version() {
        let db = Database::open_in_memory().unwrap();
        let basic = db.get_plan(PlanId::Basic).unwrap().unwrap();
        assert_eq!(basic.version, 0);

        assert!(db.compare_and_set_plan_price(PlanId::Basic, 0, 1299).unwrap());
        // Second writer still holds version 0
        assert!(!db.compare_and_set_plan_price(PlanId::Basic, 0, 1499).unwrap());

        let basic = db.get_plan(PlanId::Basic).unwrap().unwrap();
        assert_eq!(basic.price, 1299);
        assert_eq!(basic.version, 1);
    }
}
