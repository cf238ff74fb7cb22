use crate::types::ApiError;
use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, PooledConnection};
use diesel::result::Error as DieselError;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use rocket::http::Status;
use rocket::outcome::try_outcome;
use rocket::request::{self, FromRequest};
use rocket::tokio::task;
use rocket::{Request, State};
use tracing::{error, info, warn};

pub mod schema;

/// The connection type every query in the crate runs against.
pub type Conn = SqliteConnection;

// An alias to the type for a pool of Diesel SQLite connections.
pub type Pool = r2d2::Pool<ConnectionManager<Conn>>;

pub struct DbConnection(pub PooledConnection<ConnectionManager<Conn>>);

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

error_chain! {
    foreign_links {
        Var(::std::env::VarError);
        R2D2(r2d2::Error);
        Diesel(DieselError);
    }

    errors {
        Migration(reason: String) {
            description("failed to run database migrations")
            display("failed to run database migrations: {}", reason)
        }
    }
}

/// Pragmas applied to every connection handed out by the pool. SQLite keeps
/// foreign key enforcement off unless each connection asks for it.
#[derive(Debug)]
struct ConnectionOptions {
    busy_timeout_ms: u32,
}

impl CustomizeConnection<Conn, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut Conn) -> ::std::result::Result<(), diesel::r2d2::Error> {
        let pragmas = format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {};",
            self.busy_timeout_ms
        );
        conn.batch_execute(&pragmas)
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Attempts to retrieve a single connection from the managed database pool. If
/// no pool is currently managed, fails with an `InternalServerError` status. If
/// no connections are available, fails with a `ServiceUnavailable` status.
/// Waiting for a connection happens on the blocking thread pool.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for DbConnection {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<DbConnection, ()> {
        let pool = try_outcome!(request.guard::<&State<Pool>>().await)
            .inner()
            .clone();
        match task::spawn_blocking(move || pool.get()).await {
            Ok(Ok(conn)) => request::Outcome::Success(DbConnection(conn)),
            Ok(Err(e)) => {
                warn!("no database connection available: {}", e);
                request::Outcome::Error((Status::ServiceUnavailable, ()))
            }
            Err(e) => {
                error!("connection checkout task failed: {}", e);
                request::Outcome::Error((Status::InternalServerError, ()))
            }
        }
    }
}

impl DbConnection {
    /// Runs `f` with this connection on Tokio's blocking thread pool and
    /// hands back its result. Every query and every password hash goes
    /// through here, never through an async worker.
    pub async fn run<F, T>(mut self, f: F) -> ::std::result::Result<T, ApiError>
    where
        F: FnOnce(&mut Conn) -> ::std::result::Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        match task::spawn_blocking(move || f(&mut self.0)).await {
            Ok(result) => result,
            Err(e) => {
                error!("database task failed: {}", e);
                Err(ApiError::Internal)
            }
        }
    }
}

pub fn init_pool(database_url: &str) -> Result<Pool> {
    let manager = ConnectionManager::<Conn>::new(database_url);
    let pool = Pool::builder()
        .connection_customizer(Box::new(ConnectionOptions {
            busy_timeout_ms: 5_000,
        }))
        .build(manager)?;
    info!("database pool ready for {}", database_url);
    Ok(pool)
}

/// Applies every embedded migration the database has not seen yet.
pub fn run_migrations(pool: &Pool) -> Result<()> {
    let mut pooled = pool.get()?;
    let conn: &mut Conn = &mut pooled;
    conn.batch_execute("PRAGMA journal_mode = WAL;")?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| Error::from(ErrorKind::Migration(e.to_string())))?;
    for version in applied {
        info!("applied migration {}", version);
    }
    Ok(())
}
