#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveDateTime};
use diesel::connection::{Connection, SimpleConnection};
use diesel::sqlite::SqliteConnection;
use tempfile::{tempdir, TempDir};

use fundsync_core::backend::{BackendSession, SessionFactory};
use fundsync_core::errors::Result;
use fundsync_core::migration::{
    Alert, MigrateCounts, MigrateHandler, MigrationOptions, MigrationTask, ResolutionCache,
    TaskContext, VerifyReport,
};
use fundsync_storage_sqlite::source::schema::{AUTHORIZATION_DDL, FUNDS_DDL, KIID_DDL};
use fundsync_storage_sqlite::{
    create_pool, create_source_pool, init, run_migrations, DbPool, SqliteAuthorizationSource,
    SqliteFundsSource, SqliteKiidSource, SqliteSessionFactory,
};

pub fn ts(value: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f").unwrap()
}

pub fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

/// Temporary legacy replicas plus a migrated backend database.
pub struct Fixture {
    _dir: TempDir,
    pub funds_path: String,
    pub salkku_path: String,
    pub kiid_path: String,
    pub backend_pool: Arc<DbPool>,
    pub funds: Arc<SqliteFundsSource>,
    pub authorizations: Arc<SqliteAuthorizationSource>,
    pub kiid: Arc<SqliteKiidSource>,
    pub sessions: Arc<SqliteSessionFactory>,
}

fn provision(path: &str, ddl: &str) {
    let mut conn = SqliteConnection::establish(path).unwrap();
    conn.batch_execute(ddl).unwrap();
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempdir().unwrap();
        let path = |name: &str| dir.path().join(name).to_str().unwrap().to_string();
        let funds_path = path("funds.db");
        let salkku_path = path("salkku.db");
        let kiid_path = path("kiid.db");

        provision(&funds_path, FUNDS_DDL);
        provision(&salkku_path, AUTHORIZATION_DDL);
        provision(&kiid_path, KIID_DDL);

        let backend_path = init(&path("backend.db")).unwrap();
        let backend_pool = create_pool(&backend_path).unwrap();
        run_migrations(&backend_pool).unwrap();

        Self {
            funds: Arc::new(SqliteFundsSource::new(create_source_pool(&funds_path).unwrap())),
            authorizations: Arc::new(SqliteAuthorizationSource::new(
                create_source_pool(&salkku_path).unwrap(),
            )),
            kiid: Arc::new(SqliteKiidSource::new(create_source_pool(&kiid_path).unwrap())),
            sessions: Arc::new(SqliteSessionFactory::new(backend_pool.clone())),
            backend_pool,
            funds_path,
            salkku_path,
            kiid_path,
            _dir: dir,
        }
    }

    /// Writes to the legacy funds replica.
    pub fn funds_sql(&self, sql: &str) {
        let mut conn = SqliteConnection::establish(&self.funds_path).unwrap();
        conn.batch_execute(sql).unwrap();
    }

    pub fn salkku_sql(&self, sql: &str) {
        let mut conn = SqliteConnection::establish(&self.salkku_path).unwrap();
        conn.batch_execute(sql).unwrap();
    }

    pub fn kiid_sql(&self, sql: &str) {
        let mut conn = SqliteConnection::establish(&self.kiid_path).unwrap();
        conn.batch_execute(sql).unwrap();
    }

    /// Writes to the backend outside any session.
    pub fn backend_sql(&self, sql: &str) {
        let mut conn = self.backend_pool.get().unwrap();
        conn.batch_execute(sql).unwrap();
    }

    pub fn handler(&self) -> MigrateHandler {
        MigrateHandler::funds(
            self.funds.clone(),
            self.authorizations.clone(),
            self.sessions.clone(),
        )
    }

    pub fn kiid_handler(&self) -> MigrateHandler {
        MigrateHandler::kiid(self.kiid.clone(), self.sessions.clone())
    }

    /// Runs `f` in a backend session that is rolled back afterwards.
    pub fn inspect<T>(&self, f: impl FnOnce(&mut dyn BackendSession) -> T) -> T {
        let mut session = self.sessions.begin().unwrap();
        let value = f(session.as_mut());
        session.rollback().unwrap();
        value
    }

    /// One committed invocation of a task, as the orchestrator would run it.
    pub fn migrate(
        &self,
        task: &mut dyn MigrationTask,
        options: &MigrationOptions,
    ) -> Result<(MigrateCounts, Vec<Alert>)> {
        self.migrate_until(task, options, Instant::now() + Duration::from_secs(600))
    }

    pub fn migrate_until(
        &self,
        task: &mut dyn MigrationTask,
        options: &MigrationOptions,
        deadline: Instant,
    ) -> Result<(MigrateCounts, Vec<Alert>)> {
        let mut session = self.sessions.begin()?;
        let mut cache = ResolutionCache::new();
        let mut alerts = Vec::new();
        let result = {
            let mut ctx = TaskContext::new(
                task.name(),
                options,
                &mut cache,
                &mut alerts,
                deadline,
            );
            task.prepare(session.as_mut(), options)
                .and_then(|_| task.migrate(session.as_mut(), &mut ctx))
        };
        match result {
            Ok(counts) => {
                session.commit()?;
                Ok((counts, alerts))
            }
            Err(e) => {
                session.rollback()?;
                Err(e)
            }
        }
    }

    pub fn up_to_date(&self, task: &dyn MigrationTask, options: &MigrationOptions) -> bool {
        self.inspect(|session| task.up_to_date(session, options).unwrap())
    }

    pub fn verify(&self, task: &dyn MigrationTask, options: &MigrationOptions) -> VerifyReport {
        let mut cache = ResolutionCache::new();
        let mut alerts = Vec::new();
        self.inspect(|session| {
            let mut ctx = TaskContext::new(
                task.name(),
                options,
                &mut cache,
                &mut alerts,
                Instant::now() + Duration::from_secs(600),
            );
            task.verify(session, &mut ctx).unwrap()
        })
    }

    /// Companies A, B and C; B only owns a restricted portfolio.
    pub fn seed_companies(&self) {
        self.funds_sql(
            "
            INSERT INTO TABLE_COMPANY VALUES ('A', 'Alpha Oy', '1111111-1', '2024-01-01 10:00:00');
            INSERT INTO TABLE_COMPANY VALUES ('B', 'Beta Oy', '2222222-2', '2024-01-01 11:00:00');
            INSERT INTO TABLE_COMPANY VALUES ('C', 'Gamma Oy', '3333333-3', '2024-01-01 12:00:00');
            INSERT INTO TABLE_PORTFOL VALUES ('PA', 'A', 'Alpha main', 1, '2024-01-02 10:00:00');
            INSERT INTO TABLE_PORTFOL VALUES ('PB', 'B', 'Beta restricted', 3, '2024-01-02 11:00:00');
            INSERT INTO TABLE_PORTFOL VALUES ('PC', 'C', 'Gamma main', 1, '2024-01-02 12:00:00');
        ",
        );
    }

    /// Two securities and three logs for S1 with amounts 10, 20 and -5.
    pub fn seed_ledger(&self) {
        self.seed_companies();
        self.funds_sql(
            "
            INSERT INTO TABLE_SECURITY VALUES ('S1', NULL, 'EUR', 'Rahasto 1', 'Fond 1', 'Fund 1', NULL, '2024-01-03 10:00:00');
            INSERT INTO TABLE_SECURITY VALUES ('S2', NULL, 'EUR', 'Rahasto 2', 'Fond 2', 'Fund 2', NULL, '2024-01-03 11:00:00');
            INSERT INTO TABLE_PORTLOG VALUES (1, 'PA', 'A', 'S1', NULL, NULL, 'BUY', '2024-02-01', '2024-02-03', '10.000000', NULL, '1.500000', '15.000000', '15.000000', 1, '2024-02-01 10:00:00');
            INSERT INTO TABLE_PORTLOG VALUES (2, 'PA', 'A', 'S1', NULL, NULL, 'BUY', '2024-02-02', NULL, '20.000000', NULL, '1.500000', '30.000000', '30.000000', 1, '2024-02-02 10:00:00');
            INSERT INTO TABLE_PORTLOG VALUES (3, NULL, 'C', 'S1', NULL, NULL, 'SELL', '2024-02-03', '1960-01-01', '-5.000000', NULL, '1.600000', '-8.000000', '-8.000000', 1, '2024-02-03 10:00:00');
            INSERT INTO TABLE_PORTLOG VALUES (4, 'PB', 'B', 'S2', NULL, NULL, 'BUY', '2024-02-04', '2024-02-05', '7.000000', NULL, NULL, NULL, NULL, 1, '2024-02-04 10:00:00');
            INSERT INTO TABLE_PORTRANS VALUES (11, 'PA', 'S1', '30.000000', '45.000000', '2024-02-01', '2024-02-01 10:00:00');
            INSERT INTO TABLE_PORTRANS VALUES (12, 'PC', 'S1', '-5.000000', '-8.000000', '2024-02-03', '2024-02-03 10:00:00');
            INSERT INTO TABLE_PORTRANS VALUES (13, 'PB', 'S2', '7.000000', '7.000000', '2024-02-04', '2024-02-04 10:00:00');
            INSERT INTO TABLE_RATE VALUES ('S1', '2024-02-01', '1.500000', '2024-02-01 18:00:00');
            INSERT INTO TABLE_RATE VALUES ('S1', '2024-02-02', '1.550000', '2024-02-02 18:00:00');
            INSERT INTO TABLE_RATE VALUES ('S2', '2024-02-02', '9.100000', '2024-02-02 18:00:00');
            INSERT INTO TABLE_RATELAST VALUES ('S1', '2024-02-02', '1.550000', '2024-02-02 18:00:00');
            INSERT INTO TABLE_RATELAST VALUES ('S2', '2024-02-02', '9.100000', '2024-02-02 18:00:00');
        ",
        );
    }

    /// Grants: one valid, one denied, one expired, one not yet started.
    pub fn seed_authorizations(&self) {
        self.salkku_sql(
            "
            INSERT INTO \"Authorization\" VALUES (1, '010101-123A', 'A', '2024-01-01', NULL, 0, '2024-03-01 09:00:00');
            INSERT INTO \"Authorization\" VALUES (2, '020202-234B', 'A', NULL, NULL, 1, '2024-03-01 09:00:00');
            INSERT INTO \"Authorization\" VALUES (3, '030303-345C', 'C', '2024-01-01', '2024-02-01', 0, '2024-03-01 09:00:00');
            INSERT INTO \"Authorization\" VALUES (4, '040404-456D', 'C', '2099-01-01', NULL, 0, '2024-03-01 09:00:00');
        ",
        );
    }
}

pub fn options() -> MigrationOptions {
    MigrationOptions {
        today: date("2024-06-01"),
        ..MigrationOptions::default()
    }
}
