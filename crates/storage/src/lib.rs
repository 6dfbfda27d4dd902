mod session;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::{migrate::MigrateError, sqlite::SqlitePoolOptions, sqlite::SqliteRow, Row, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use hearth_core::payment::{PaymentCategory, PaymentDraft, RecurringPeriod};
use hearth_core::types::{Apartment, ApartmentId, ChoreInstance, StoredChore, User, UserId};

pub use session::HouseholdSession;

const SQLITE_CONSTRAINT_FOREIGNKEY: &str = "787";
const SQLITE_CONSTRAINT_PRIMARYKEY: &str = "1555";
const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(StorageError::Connect)?;

        apply_pragmas(&pool).await?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Returns a handle for household members.
    pub fn users(&self) -> UserRepository {
        UserRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle for apartments and their tenants.
    pub fn apartments(&self) -> ApartmentRepository {
        ApartmentRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle for stored chore occurrences.
    pub fn chores(&self) -> ChoreRepository {
        ChoreRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle for payments.
    pub fn payments(&self) -> PaymentRepository {
        PaymentRepository {
            pool: self.pool.clone(),
        }
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn apply_pragmas(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query("PRAGMA foreign_keys = ON;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA journal_mode = WAL;")
        .fetch_one(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA synchronous = NORMAL;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    Ok(())
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to apply pragma: {0}")]
    Pragma(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository for household members.
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates the user or refreshes their display name.
    pub async fn upsert(
        &self,
        user_id: &str,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> Result<User, UserError> {
        let at = to_rfc3339(now);
        sqlx::query(
            "INSERT INTO users (id, display_name, created_at, updated_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET display_name = excluded.display_name, updated_at = excluded.updated_at",
        )
        .bind(user_id)
        .bind(display_name)
        .bind(&at)
        .bind(&at)
        .execute(&self.pool)
        .await?;

        Ok(User {
            id: UserId::new(user_id),
            display_name: display_name.to_string(),
        })
    }

    pub async fn fetch(&self, user_id: &str) -> Result<Option<User>, UserError> {
        let row = sqlx::query("SELECT id, display_name FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| -> Result<User, UserError> {
            Ok(User {
                id: UserId::new(row.try_get::<String, _>("id")?),
                display_name: row.try_get("display_name")?,
            })
        })
        .transpose()
    }
}

#[derive(Debug, Error)]
pub enum UserError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository for apartments and tenant membership.
#[derive(Clone)]
pub struct ApartmentRepository {
    pool: SqlitePool,
}

impl ApartmentRepository {
    /// Creates an apartment and joins `founder_id` as its first tenant.
    pub async fn create(
        &self,
        name: &str,
        founder_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Apartment, ApartmentError> {
        let id = Uuid::new_v4().to_string();
        let at = to_rfc3339(now);

        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO apartments (id, name, created_at) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(name)
            .bind(&at)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO apartment_tenants (apartment_id, user_id, joined_at) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(founder_id)
            .bind(&at)
            .execute(&mut *tx)
            .await
            .map_err(membership_error)?;
        tx.commit().await?;

        Ok(Apartment {
            id: ApartmentId::new(id),
            name: name.to_string(),
            tenant_ids: vec![UserId::new(founder_id)],
        })
    }

    /// Adds `user_id` to an existing apartment.
    pub async fn add_tenant(
        &self,
        apartment_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ApartmentError> {
        sqlx::query("INSERT INTO apartment_tenants (apartment_id, user_id, joined_at) VALUES (?, ?, ?)")
            .bind(apartment_id)
            .bind(user_id)
            .bind(to_rfc3339(now))
            .execute(&self.pool)
            .await
            .map_err(membership_error)?;
        Ok(())
    }

    /// Loads the apartment `user_id` lives in, with every tenant id.
    pub async fn fetch_for_user(&self, user_id: &str) -> Result<Option<Apartment>, ApartmentError> {
        let row = sqlx::query(
            "SELECT a.id, a.name FROM apartments a \
             JOIN apartment_tenants t ON t.apartment_id = a.id \
             WHERE t.user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let id: String = row.try_get("id")?;
        let name: String = row.try_get("name")?;

        let tenant_ids = sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM apartment_tenants WHERE apartment_id = ? ORDER BY joined_at, user_id",
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(UserId::new)
        .collect();

        Ok(Some(Apartment {
            id: ApartmentId::new(id),
            name,
            tenant_ids,
        }))
    }
}

fn membership_error(err: sqlx::Error) -> ApartmentError {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|code| code.into_owned());
            match code.as_deref() {
                Some(SQLITE_CONSTRAINT_UNIQUE) | Some(SQLITE_CONSTRAINT_PRIMARYKEY) => {
                    ApartmentError::AlreadyTenant
                }
                Some(SQLITE_CONSTRAINT_FOREIGNKEY) => ApartmentError::UnknownReference,
                _ => ApartmentError::Database(sqlx::Error::Database(db_err)),
            }
        }
        other => ApartmentError::Database(other),
    }
}

#[derive(Debug, Error)]
pub enum ApartmentError {
    #[error("user already belongs to an apartment")]
    AlreadyTenant,
    #[error("apartment or user does not exist")]
    UnknownReference,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository for chore occurrences.
#[derive(Clone)]
pub struct ChoreRepository {
    pool: SqlitePool,
}

impl ChoreRepository {
    /// Inserts one occurrence and returns its generated identifier.
    ///
    /// Returns once the row is committed.
    pub async fn insert(
        &self,
        chore: &ChoreInstance,
        now: DateTime<Utc>,
    ) -> Result<String, ChoreError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO chores \
             (id, apartment_id, user_id, name, assignee, details, due_date, completed, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(chore.owner_id.as_str())
        .bind(chore.user_id.as_str())
        .bind(&chore.name)
        .bind(&chore.assignee)
        .bind(&chore.details)
        .bind(chore.due_date)
        .bind(chore.completed)
        .bind(to_rfc3339(now))
        .execute(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db_err)
                if db_err.code().as_deref() == Some(SQLITE_CONSTRAINT_FOREIGNKEY) =>
            {
                ChoreError::UnknownReference
            }
            other => ChoreError::Database(other),
        })?;

        Ok(id)
    }

    /// Lists an apartment's chores by due date, then insertion order.
    pub async fn list_for_apartment(
        &self,
        apartment_id: &str,
    ) -> Result<Vec<StoredChore>, ChoreError> {
        let rows = sqlx::query(
            "SELECT id, apartment_id, user_id, name, assignee, details, due_date, completed \
             FROM chores WHERE apartment_id = ? ORDER BY due_date, seq",
        )
        .bind(apartment_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(stored_chore_from_row)
            .collect::<Result<_, _>>()
            .map_err(ChoreError::from)
    }

    /// Sets the completion flag on a chore belonging to `apartment_id`.
    pub async fn set_completed(
        &self,
        apartment_id: &str,
        chore_id: &str,
        completed: bool,
    ) -> Result<StoredChore, ChoreError> {
        let row = sqlx::query(
            "UPDATE chores SET completed = ? WHERE id = ? AND apartment_id = ? \
             RETURNING id, apartment_id, user_id, name, assignee, details, due_date, completed",
        )
        .bind(completed)
        .bind(chore_id)
        .bind(apartment_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ChoreError::NotFound)?;

        Ok(stored_chore_from_row(&row)?)
    }
}

fn stored_chore_from_row(row: &SqliteRow) -> Result<StoredChore, sqlx::Error> {
    Ok(StoredChore {
        id: row.try_get("id")?,
        chore: ChoreInstance {
            owner_id: ApartmentId::new(row.try_get::<String, _>("apartment_id")?),
            user_id: UserId::new(row.try_get::<String, _>("user_id")?),
            name: row.try_get("name")?,
            assignee: row.try_get("assignee")?,
            details: row.try_get("details")?,
            due_date: row.try_get::<NaiveDate, _>("due_date")?,
            completed: row.try_get("completed")?,
        },
    })
}

#[derive(Debug, Error)]
pub enum ChoreError {
    #[error("chore not found")]
    NotFound,
    #[error("apartment or user does not exist")]
    UnknownReference,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository for payments between tenants.
#[derive(Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    pub async fn insert(
        &self,
        apartment_id: &str,
        payment: &PaymentDraft,
        now: DateTime<Utc>,
    ) -> Result<String, PaymentRecordError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO payments \
             (id, apartment_id, amount_cents, loaner, loanee, created_on, paid_on, due_date, description, category, recurring_period, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(apartment_id)
        .bind(payment.amount_cents)
        .bind(&payment.loaner)
        .bind(&payment.loanee)
        .bind(payment.created_on)
        .bind(payment.paid_on)
        .bind(payment.due_date)
        .bind(&payment.description)
        .bind(payment.category.as_str())
        .bind(payment.recurring_period.as_str())
        .bind(to_rfc3339(now))
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    /// Lists an apartment's payments ordered by due date.
    pub async fn list_for_apartment(
        &self,
        apartment_id: &str,
    ) -> Result<Vec<PaymentDraft>, PaymentRecordError> {
        let rows = sqlx::query(
            "SELECT amount_cents, loaner, loanee, created_on, paid_on, due_date, description, category, recurring_period \
             FROM payments WHERE apartment_id = ? ORDER BY due_date, created_at",
        )
        .bind(apartment_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<PaymentDraft, PaymentRecordError> {
                let category: String = row.try_get("category")?;
                let period: String = row.try_get("recurring_period")?;
                Ok(PaymentDraft {
                    amount_cents: row.try_get("amount_cents")?,
                    loaner: row.try_get("loaner")?,
                    loanee: row.try_get("loanee")?,
                    created_on: row.try_get("created_on")?,
                    paid_on: row.try_get("paid_on")?,
                    due_date: row.try_get("due_date")?,
                    description: row.try_get("description")?,
                    category: PaymentCategory::parse(&category)
                        .ok_or(PaymentRecordError::Corrupt(category))?,
                    recurring_period: RecurringPeriod::parse(&period)
                        .ok_or(PaymentRecordError::Corrupt(period))?,
                })
            })
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum PaymentRecordError {
    #[error("unrecognised stored value: {0}")]
    Corrupt(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}
