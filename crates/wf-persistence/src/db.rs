// Archivo: db.rs
// Propósito: pool r2d2 de conexiones Diesel, selección de backend por
// feature (`pg` => Postgres, si no SQLite), migraciones embebidas y
// helpers compartidos por los repositorios.
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use flow::{FlowError, Result};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

#[cfg(feature = "pg")]
pub(crate) type DbConn = PgConnection;
#[cfg(not(feature = "pg"))]
pub(crate) type DbConn = SqliteConnection;
pub(crate) type DbPool = Pool<ConnectionManager<DbConn>>;
pub(crate) type PooledConn = PooledConnection<ConnectionManager<DbConn>>;

/// Ajustes aplicados a cada conexión SQLite al salir del pool.
#[cfg(not(feature = "pg"))]
#[derive(Debug)]
struct SqliteTuning;

#[cfg(not(feature = "pg"))]
impl diesel::r2d2::CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqliteTuning {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), diesel::r2d2::Error> {
        let _ = diesel::sql_query("PRAGMA busy_timeout = 5000;").execute(conn);
        let _ = diesel::sql_query("PRAGMA journal_mode = WAL;").execute(conn);
        Ok(())
    }
}

/// Crea el pool y aplica las migraciones pendientes.
pub(crate) fn build_pool(database_url: &str) -> Result<DbPool> {
    let manager = ConnectionManager::<DbConn>::new(database_url);
    let builder = Pool::builder().max_size(4);
    #[cfg(not(feature = "pg"))]
    let builder = builder.connection_customizer(Box::new(SqliteTuning));
    let pool = builder.build(manager)
                      .map_err(|e| FlowError::Storage(format!("no se pudo crear el pool de conexiones: {}", e)))?;
    let mut conn = checkout(&pool)?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| FlowError::Storage(format!("migraciones fallidas: {}", e)))?;
    Ok(pool)
}

pub(crate) fn checkout(pool: &DbPool) -> Result<PooledConn> {
    pool.get().map_err(|e| FlowError::Storage(format!("pool: {}", e)))
}

pub(crate) fn map_db_err<T>(res: std::result::Result<T, DieselError>) -> Result<T> {
    res.map_err(|e| match e {
           DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
               FlowError::Conflict(format!("db: {}", info.message()))
           }
           other => FlowError::Storage(format!("db: {}", other)),
       })
}

/// URL de la base primaria: `WF_PRIMARY_DB_URL`, con `DATABASE_URL` como
/// fallback.
pub fn primary_url_from_env() -> Result<String> {
    dotenvy::dotenv().ok();
    let url = std::env::var("WF_PRIMARY_DB_URL").or_else(|_| std::env::var("DATABASE_URL"))
                                                .map_err(|_| {
                                                    FlowError::Other("WF_PRIMARY_DB_URL / DATABASE_URL no definida".into())
                                                })?;
    check_backend(&url)?;
    Ok(url)
}

/// URL del store secundario (`WF_SECONDARY_DB_URL`); por defecto la misma
/// base que la primaria.
pub fn secondary_url_from_env() -> Result<String> {
    dotenvy::dotenv().ok();
    match std::env::var("WF_SECONDARY_DB_URL") {
        Ok(url) => {
            check_backend(&url)?;
            Ok(url)
        }
        Err(_) => primary_url_from_env(),
    }
}

#[cfg(feature = "pg")]
fn check_backend(url: &str) -> Result<()> {
    let l = url.to_lowercase();
    if l.starts_with("postgres") || url.contains('@') {
        Ok(())
    } else {
        Err(FlowError::Other(format!("'{}' no parece una URL de Postgres", url)))
    }
}

#[cfg(not(feature = "pg"))]
fn check_backend(url: &str) -> Result<()> {
    if url.to_lowercase().starts_with("postgres") {
        return Err(FlowError::Other("wf-persistence se compiló sin la feature 'pg'; actívela para usar Postgres".into()));
    }
    Ok(())
}
