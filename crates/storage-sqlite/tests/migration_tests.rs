//! Task-level behaviour against real SQLite sources and backend.

mod common;

use std::time::Instant;

use common::{options, ts, Fixture};
use rust_decimal_macros::dec;

use fundsync_core::backend::FundGroup;
use fundsync_core::errors::Error;
use fundsync_core::migration::{
    CompaniesTask, CompanyAccessTask, EntityKind, FundsTask, LastRateTask, MigrateCounts,
    MigrationError, MigrationOptions, MigrationTask, PortfolioLogsTask,
    PortfolioTransactionsTask, PortfoliosTask, RepairKind, RowErrorPolicy, SecuritiesTask,
    SecurityRatesTask,
};

/// Securities, companies and portfolios; what the ledger tasks reference.
fn migrate_reference(fx: &Fixture, options: &MigrationOptions) {
    fx.migrate(&mut SecuritiesTask::new(fx.funds.clone()), options)
        .unwrap();
    fx.migrate(&mut CompaniesTask::new(fx.funds.clone()), options)
        .unwrap();
    fx.migrate(&mut PortfoliosTask::new(fx.funds.clone()), options)
        .unwrap();
}

#[test]
fn test_second_run_changes_nothing() {
    let fx = Fixture::new();
    fx.seed_companies();
    let options = options();
    let mut task = CompaniesTask::new(fx.funds.clone());

    assert!(!fx.up_to_date(&task, &options));
    let (first, _) = fx.migrate(&mut task, &options).unwrap();
    assert_eq!(first.created, 2);

    let (second, _) = fx.migrate(&mut task, &options).unwrap();
    assert_eq!(second.changed(), 0);
    assert!(fx.up_to_date(&task, &options));
}

#[test]
fn test_restricted_company_is_left_out() {
    let fx = Fixture::new();
    fx.seed_companies();
    let options = options();
    let mut task = CompaniesTask::new(fx.funds.clone());
    fx.migrate(&mut task, &options).unwrap();

    let mut codes = fx.inspect(|s| s.company_codes().unwrap());
    codes.sort();
    assert_eq!(codes, vec!["A".to_string(), "C".to_string()]);
    assert!(fx.up_to_date(&task, &options));
}

#[test]
fn test_row_limit_resumes_across_invocations() {
    let fx = Fixture::new();
    fx.funds_sql(
        "
        INSERT INTO TABLE_COMPANY VALUES ('K1', 'One', NULL, '2024-01-01 10:00:01');
        INSERT INTO TABLE_COMPANY VALUES ('K2', 'Two', NULL, '2024-01-01 10:00:02');
        INSERT INTO TABLE_COMPANY VALUES ('K3', 'Three', NULL, '2024-01-01 10:00:03');
        INSERT INTO TABLE_COMPANY VALUES ('K4', 'Four', NULL, '2024-01-01 10:00:04');
        INSERT INTO TABLE_COMPANY VALUES ('K5', 'Five', NULL, '2024-01-01 10:00:05');
    ",
    );
    let options = MigrationOptions {
        row_limit: Some(2),
        ..options()
    };
    let mut task = CompaniesTask::new(fx.funds.clone());

    let mut created = 0;
    let mut updated = 0;
    let mut invocations = 0;
    while !fx.up_to_date(&task, &options) {
        invocations += 1;
        assert!(invocations <= 10, "did not converge");
        let (counts, _) = fx.migrate(&mut task, &options).unwrap();
        created += counts.created;
        updated += counts.updated;
    }

    assert!(invocations > 1);
    assert_eq!(created, 5);
    assert_eq!(updated, 0);
}

#[test]
fn test_row_limit_passes_rows_sharing_one_second() {
    let fx = Fixture::new();
    fx.funds_sql(
        "
        INSERT INTO TABLE_COMPANY VALUES ('K1', 'One', NULL, '2024-01-01 10:00:00');
        INSERT INTO TABLE_COMPANY VALUES ('K2', 'Two', NULL, '2024-01-01 10:00:00');
        INSERT INTO TABLE_COMPANY VALUES ('K3', 'Three', NULL, '2024-01-01 10:00:00');
        INSERT INTO TABLE_COMPANY VALUES ('K4', 'Four', NULL, '2024-01-01 10:00:00');
        INSERT INTO TABLE_COMPANY VALUES ('K5', 'Five', NULL, '2024-01-01 10:00:00');
    ",
    );
    let options = MigrationOptions {
        row_limit: Some(2),
        ..options()
    };
    let mut task = CompaniesTask::new(fx.funds.clone());

    let mut created = 0;
    let mut updated = 0;
    let mut invocations = 0;
    while !fx.up_to_date(&task, &options) {
        invocations += 1;
        assert!(invocations <= 10, "did not converge");
        let (counts, _) = fx.migrate(&mut task, &options).unwrap();
        assert!(counts.created > 0, "invocation {} made no progress", invocations);
        created += counts.created;
        updated += counts.updated;
    }

    assert_eq!(invocations, 3);
    assert_eq!(created, 5);
    assert_eq!(updated, 0);
}

#[test]
fn test_securities_resume_within_one_second() {
    let fx = Fixture::new();
    fx.funds_sql(
        "
        INSERT INTO TABLE_SECURITY VALUES ('S1', NULL, 'EUR', 'A', NULL, NULL, NULL, '2024-01-03 10:00:00');
        INSERT INTO TABLE_SECURITY VALUES ('S2', NULL, 'EUR', 'B', NULL, NULL, NULL, '2024-01-03 10:00:00');
        INSERT INTO TABLE_SECURITY VALUES ('S3', NULL, 'EUR', 'C', NULL, NULL, NULL, '2024-01-03 10:00:00');
    ",
    );
    let options = MigrationOptions {
        row_limit: Some(1),
        ..options()
    };
    let mut task = SecuritiesTask::new(fx.funds.clone());

    let mut created = 0;
    for _ in 0..3 {
        let (counts, _) = fx.migrate(&mut task, &options).unwrap();
        assert_eq!(counts.created, 1);
        created += counts.created;
    }
    assert_eq!(created, 3);
    assert!(fx.up_to_date(&task, &options));
}

#[test]
fn test_past_deadline_stops_before_any_row() {
    let fx = Fixture::new();
    fx.seed_companies();
    let options = options();
    let mut task = CompaniesTask::new(fx.funds.clone());

    let (counts, _) = fx.migrate_until(&mut task, &options, Instant::now()).unwrap();
    assert_eq!(counts, MigrateCounts::default());
    assert!(!fx.up_to_date(&task, &options));

    let (counts, _) = fx.migrate(&mut task, &options).unwrap();
    assert_eq!(counts.created, 2);
    assert!(fx.up_to_date(&task, &options));
}

#[test]
fn test_referenced_company_survives_source_removal() {
    let fx = Fixture::new();
    fx.seed_companies();
    fx.funds_sql(
        "INSERT INTO TABLE_COMPANY VALUES ('D', 'Delta Oy', NULL, '2024-01-01 13:00:00');",
    );
    let options = options();
    let mut companies = CompaniesTask::new(fx.funds.clone());
    fx.migrate(&mut companies, &options).unwrap();
    fx.migrate(&mut PortfoliosTask::new(fx.funds.clone()), &options)
        .unwrap();

    fx.funds_sql("DELETE FROM TABLE_COMPANY WHERE COMID IN ('A', 'D');");
    let (counts, _) = fx.migrate(&mut companies, &options).unwrap();

    assert_eq!(counts.deleted, 1);
    let mut codes = fx.inspect(|s| s.company_codes().unwrap());
    codes.sort();
    assert_eq!(codes, vec!["A".to_string(), "C".to_string()]);
}

#[test]
fn test_company_with_only_access_grants_survives_source_removal() {
    let fx = Fixture::new();
    fx.seed_companies();
    fx.seed_authorizations();
    let options = options();
    let mut companies = CompaniesTask::new(fx.funds.clone());
    fx.migrate(&mut companies, &options).unwrap();
    fx.migrate(&mut CompanyAccessTask::new(fx.authorizations.clone()), &options)
        .unwrap();

    fx.funds_sql("DELETE FROM TABLE_COMPANY WHERE COMID IN ('A', 'C');");
    let (counts, _) = fx.migrate(&mut companies, &options).unwrap();

    assert_eq!(counts.deleted, 1);
    assert_eq!(fx.inspect(|s| s.company_codes().unwrap()), vec!["A".to_string()]);
}

#[test]
fn test_counter_company_of_a_log_survives_source_removal() {
    let fx = Fixture::new();
    fx.seed_ledger();
    fx.funds_sql(
        "
        INSERT INTO TABLE_COMPANY VALUES ('X', 'Counter Oy', NULL, '2024-01-01 13:00:00');
        INSERT INTO TABLE_COMPANY VALUES ('Y', 'Unused Oy', NULL, '2024-01-01 14:00:00');
        INSERT INTO TABLE_PORTLOG VALUES (5, 'PA', 'A', 'S1', NULL, 'X', 'TRANSFER', '2024-02-05',
            NULL, '1.000000', NULL, NULL, NULL, NULL, 1, '2024-02-05 10:00:00');
    ",
    );
    let options = options();
    migrate_reference(&fx, &options);
    fx.migrate(&mut PortfolioLogsTask::new(fx.funds.clone()), &options)
        .unwrap();

    fx.funds_sql("DELETE FROM TABLE_COMPANY WHERE COMID IN ('X', 'Y');");
    let mut companies = CompaniesTask::new(fx.funds.clone());
    let (counts, _) = fx.migrate(&mut companies, &options).unwrap();

    assert_eq!(counts.deleted, 1);
    let mut codes = fx.inspect(|s| s.company_codes().unwrap());
    codes.sort();
    assert_eq!(codes, vec!["A".to_string(), "C".to_string(), "X".to_string()]);
}

#[test]
fn test_portfolio_with_logs_survives_source_removal() {
    let fx = Fixture::new();
    fx.seed_ledger();
    fx.funds_sql(
        "INSERT INTO TABLE_PORTFOL VALUES ('PD', 'A', 'Alpha spare', 1, '2024-01-02 13:00:00');",
    );
    let options = options();
    migrate_reference(&fx, &options);
    fx.migrate(&mut PortfolioLogsTask::new(fx.funds.clone()), &options)
        .unwrap();

    fx.funds_sql("DELETE FROM TABLE_PORTFOL WHERE PORID IN ('PA', 'PD');");
    let mut portfolios = PortfoliosTask::new(fx.funds.clone());
    let (counts, _) = fx.migrate(&mut portfolios, &options).unwrap();

    assert_eq!(counts.deleted, 1);
    let mut codes = fx.inspect(|s| s.portfolio_codes().unwrap());
    codes.sort();
    assert_eq!(codes, vec!["PA".to_string(), "PC".to_string()]);
}

#[test]
fn test_portfolio_with_transactions_survives_source_removal() {
    let fx = Fixture::new();
    fx.seed_ledger();
    fx.funds_sql(
        "INSERT INTO TABLE_PORTFOL VALUES ('PD', 'A', 'Alpha spare', 1, '2024-01-02 13:00:00');",
    );
    let options = options();
    migrate_reference(&fx, &options);
    fx.migrate(&mut PortfolioTransactionsTask::new(fx.funds.clone()), &options)
        .unwrap();

    fx.funds_sql("DELETE FROM TABLE_PORTFOL WHERE PORID IN ('PC', 'PD');");
    let mut portfolios = PortfoliosTask::new(fx.funds.clone());
    let (counts, _) = fx.migrate(&mut portfolios, &options).unwrap();

    assert_eq!(counts.deleted, 1);
    let mut codes = fx.inspect(|s| s.portfolio_codes().unwrap());
    codes.sort();
    assert_eq!(codes, vec!["PA".to_string(), "PC".to_string()]);
}

#[test]
fn test_touched_row_is_stale_then_updated() {
    let fx = Fixture::new();
    fx.seed_companies();
    let options = options();
    let mut task = CompaniesTask::new(fx.funds.clone());
    fx.migrate(&mut task, &options).unwrap();
    assert!(fx.up_to_date(&task, &options));

    fx.funds_sql(
        "UPDATE TABLE_COMPANY SET NAME = 'Gamma Oyj', UPDATED = '2024-01-01 12:00:01' WHERE COMID = 'C';",
    );
    assert!(!fx.up_to_date(&task, &options));

    let (counts, _) = fx.migrate(&mut task, &options).unwrap();
    assert_eq!(counts.updated, 1);
    assert_eq!(counts.created + counts.deleted + counts.skipped, 0);

    let company = fx.inspect(|s| s.find_company("C").unwrap()).unwrap();
    assert_eq!(company.name.as_deref(), Some("Gamma Oyj"));
    assert_eq!(company.updated, Some(ts("2024-01-01 12:00:01")));
    assert!(fx.up_to_date(&task, &options));
}

#[test]
fn test_missing_security_aborts_without_placeholders() {
    let fx = Fixture::new();
    fx.seed_ledger();
    fx.funds_sql(
        "INSERT INTO TABLE_PORTLOG VALUES (9, 'PA', 'A', 'S9', NULL, NULL, 'BUY', '2024-02-09', NULL, '1.000000', NULL, NULL, NULL, NULL, 1, '2024-02-09 10:00:00');",
    );
    let options = MigrationOptions {
        row_error_policy: RowErrorPolicy::AbortTask,
        ..options()
    };
    migrate_reference(&fx, &options);

    let err = fx
        .migrate(&mut PortfolioLogsTask::new(fx.funds.clone()), &options)
        .unwrap_err();
    match err {
        Error::Migration(MigrationError::MissingEntity(missing)) => {
            assert_eq!(missing.kind, EntityKind::Security);
            assert_eq!(missing.original_id, "S9");
            assert_eq!(missing.target_task, "securities");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(fx.inspect(|s| s.find_portfolio_log(9).unwrap()).is_none());
}

#[test]
fn test_missing_security_is_created_as_placeholder() {
    let fx = Fixture::new();
    fx.seed_ledger();
    fx.funds_sql(
        "INSERT INTO TABLE_PORTLOG VALUES (9, 'PA', 'A', 'S9', NULL, NULL, 'BUY', '2024-02-09', NULL, '1.000000', NULL, NULL, NULL, NULL, 1, '2024-02-09 10:00:00');",
    );
    let options = MigrationOptions {
        create_missing_relations: true,
        ..options()
    };
    migrate_reference(&fx, &options);

    let (counts, alerts) = fx
        .migrate(&mut PortfolioLogsTask::new(fx.funds.clone()), &options)
        .unwrap();
    assert_eq!(counts.created, 4);
    assert!(alerts
        .iter()
        .any(|a| a.message.contains("placeholder") && a.message.contains("S9")));

    let security = fx.inspect(|s| s.find_security("S9").unwrap()).unwrap();
    assert_eq!(security.updated, None);
    let log = fx.inspect(|s| s.find_portfolio_log(9).unwrap()).unwrap();
    assert_eq!(log.security_id, security.id);
    assert_eq!(
        fx.inspect(|s| s.placeholder_security_codes().unwrap()),
        vec!["S9".to_string()]
    );

    // the next securities run replaces the placeholder once the source has it
    fx.funds_sql(
        "INSERT INTO TABLE_SECURITY VALUES ('S9', NULL, 'SEK', 'Rahasto 9', NULL, NULL, NULL, '2024-01-01 09:00:00');",
    );
    let (counts, _) = fx
        .migrate(&mut SecuritiesTask::new(fx.funds.clone()), &options)
        .unwrap();
    assert_eq!(counts.updated, 1);
    let filled = fx.inspect(|s| s.find_security("S9").unwrap()).unwrap();
    assert_eq!(filled.id, security.id);
    assert_eq!(filled.currency.as_deref(), Some("SEK"));
}

#[test]
fn test_log_without_portfolio_uses_company_portfolio() {
    let fx = Fixture::new();
    fx.seed_ledger();
    let options = options();
    migrate_reference(&fx, &options);
    fx.migrate(&mut PortfolioLogsTask::new(fx.funds.clone()), &options)
        .unwrap();

    let log = fx.inspect(|s| s.find_portfolio_log(3).unwrap()).unwrap();
    let portfolio = fx.inspect(|s| s.find_portfolio("PC").unwrap()).unwrap();
    assert_eq!(log.portfolio_id, portfolio.id);
    // pre-epoch payment dates are stored empty
    assert_eq!(log.payment_date, None);
    // restricted portfolio PB's log never arrives
    assert!(fx.inspect(|s| s.find_portfolio_log(4).unwrap()).is_none());
}

#[test]
fn test_ambiguous_portfolio_is_skipped_with_alert() {
    let fx = Fixture::new();
    fx.seed_ledger();
    fx.funds_sql(
        "
        INSERT INTO TABLE_PORTFOL VALUES ('PC2', 'C', 'Gamma second', 1, '2024-01-02 12:30:00');
        ",
    );
    let options = options();
    migrate_reference(&fx, &options);

    let (counts, alerts) = fx
        .migrate(&mut PortfolioLogsTask::new(fx.funds.clone()), &options)
        .unwrap();
    assert_eq!(counts.created, 2);
    // the gap pass retries the row and skips it again
    assert!(counts.skipped >= 1);
    assert!(alerts.iter().any(|a| a.message.contains("'C'")));
    assert!(fx.inspect(|s| s.find_portfolio_log(3).unwrap()).is_none());
}

#[test]
fn test_verify_detects_corrupted_amount() {
    let fx = Fixture::new();
    fx.seed_ledger();
    let options = options();
    migrate_reference(&fx, &options);
    let mut task = PortfolioLogsTask::new(fx.funds.clone());
    fx.migrate(&mut task, &options).unwrap();

    let report = fx.verify(&task, &options);
    assert!(report.passed, "{:?}", report);
    assert_eq!(report.checked_partitions, 1);

    fx.backend_sql("UPDATE portfolio_logs SET amount = '21.000000' WHERE transaction_number = 2;");
    let report = fx.verify(&task, &options);
    assert!(!report.passed);
    assert_eq!(report.mismatches.len(), 1);
    let mismatch = &report.mismatches[0];
    assert_eq!(mismatch.partition, "S1");
    assert_eq!(mismatch.source.amount_sum, dec!(25));
    assert_eq!(mismatch.destination.amount_sum, dec!(26));

    assert_eq!(report.suggestions.len(), 1);
    let suggestion = &report.suggestions[0];
    assert_eq!(suggestion.kind, RepairKind::Update);
    assert!(suggestion
        .statement
        .starts_with("UPDATE portfolio_logs SET amount = 20.000000"));
    assert!(suggestion.statement.contains("WHERE transaction_number = 2"));
}

#[test]
fn test_suggested_insert_restores_a_lost_log() {
    let fx = Fixture::new();
    fx.seed_ledger();
    let options = options();
    migrate_reference(&fx, &options);
    let mut task = PortfolioLogsTask::new(fx.funds.clone());
    fx.migrate(&mut task, &options).unwrap();

    fx.backend_sql("DELETE FROM portfolio_logs WHERE transaction_number = 2;");
    let report = fx.verify(&task, &options);
    assert!(!report.passed);
    assert_eq!(report.suggestions.len(), 1);
    let suggestion = &report.suggestions[0];
    assert_eq!(suggestion.kind, RepairKind::Insert);
    assert!(suggestion.statement.contains("'2024-02-02 10:00:00'"));

    fx.backend_sql(&suggestion.statement);
    assert!(fx.verify(&task, &options).passed);
    let restored = fx.inspect(|s| s.find_portfolio_log(2).unwrap()).unwrap();
    assert_eq!(restored.updated, ts("2024-02-02 10:00:00"));
    assert!(fx.up_to_date(&task, &options));
}

#[test]
fn test_orphaned_log_is_deleted_and_task_converges() {
    let fx = Fixture::new();
    fx.seed_ledger();
    let options = options();
    migrate_reference(&fx, &options);
    let mut task = PortfolioLogsTask::new(fx.funds.clone());
    fx.migrate(&mut task, &options).unwrap();

    fx.funds_sql("DELETE FROM TABLE_PORTLOG WHERE TRANS_NR = 1;");
    assert!(!fx.up_to_date(&task, &options));
    let (counts, alerts) = fx.migrate(&mut task, &options).unwrap();
    assert_eq!(counts.deleted, 1);
    assert!(alerts.iter().any(|a| a.message.contains("no longer in the source")));
    assert!(fx.inspect(|s| s.find_portfolio_log(1).unwrap()).is_none());
    assert!(fx.inspect(|s| s.find_portfolio_log(2).unwrap()).is_some());

    assert!(fx.up_to_date(&task, &options));
    let (counts, _) = fx.migrate(&mut task, &options).unwrap();
    assert_eq!(counts.changed(), 0);
}

#[test]
fn test_removed_transaction_is_deleted() {
    let fx = Fixture::new();
    fx.seed_ledger();
    let options = options();
    migrate_reference(&fx, &options);
    let mut task = PortfolioTransactionsTask::new(fx.funds.clone());
    let (counts, _) = fx.migrate(&mut task, &options).unwrap();
    assert_eq!(counts.created, 2);

    fx.funds_sql("DELETE FROM TABLE_PORTRANS WHERE TRANS_NR = 12;");
    assert!(!fx.up_to_date(&task, &options));
    let (counts, _) = fx.migrate(&mut task, &options).unwrap();
    assert_eq!(counts.deleted, 1);
    assert_eq!(
        fx.inspect(|s| s.portfolio_transaction_numbers().unwrap()),
        vec![11]
    );
    assert!(fx.verify(&task, &options).passed);
}

#[test]
fn test_rates_follow_the_source() {
    let fx = Fixture::new();
    fx.seed_ledger();
    let options = options();
    migrate_reference(&fx, &options);

    let mut rates = SecurityRatesTask::new(fx.funds.clone());
    let (counts, _) = fx.migrate(&mut rates, &options).unwrap();
    assert_eq!(counts.created, 3);
    assert!(fx.verify(&rates, &options).passed);

    let mut last = LastRateTask::new(fx.funds.clone());
    let (counts, _) = fx.migrate(&mut last, &options).unwrap();
    assert_eq!(counts.created, 2);

    assert!(fx.verify(&last, &options).passed);

    fx.backend_sql(
        "UPDATE last_rates SET rate_close = '1.600000' \
         WHERE security_id = (SELECT id FROM securities WHERE original_id = 'S1');",
    );
    let report = fx.verify(&last, &options);
    assert!(!report.passed);
    assert_eq!(report.checked_partitions, 2);
    assert_eq!(report.mismatches.len(), 1);
    assert_eq!(report.mismatches[0].partition, "S1");
    assert_eq!(report.suggestions.len(), 1);
    let suggestion = &report.suggestions[0];
    assert_eq!(suggestion.kind, RepairKind::Update);
    assert!(suggestion
        .statement
        .starts_with("UPDATE last_rates SET rate_close = 1.550000 WHERE"));
    fx.backend_sql(&suggestion.statement);
    assert!(fx.verify(&last, &options).passed);

    fx.funds_sql("DELETE FROM TABLE_RATELAST WHERE SECID = 'S2';");
    let (counts, _) = fx.migrate(&mut last, &options).unwrap();
    assert_eq!(counts.deleted, 1);
    assert!(fx.up_to_date(&last, &options));
    assert!(fx.verify(&last, &options).passed);
}

#[test]
fn test_company_access_tracks_valid_grants() {
    let fx = Fixture::new();
    fx.seed_companies();
    fx.seed_authorizations();
    let options = options();
    fx.migrate(&mut CompaniesTask::new(fx.funds.clone()), &options)
        .unwrap();

    let mut task = CompanyAccessTask::new(fx.authorizations.clone());
    let (counts, _) = fx.migrate(&mut task, &options).unwrap();
    assert_eq!(counts.created, 1);
    assert!(fx.up_to_date(&task, &options));

    fx.salkku_sql(
        "INSERT INTO \"Authorization\" VALUES (5, '050505-567E', 'C', NULL, NULL, 0, '2024-03-02 09:00:00');",
    );
    let (counts, _) = fx.migrate(&mut task, &options).unwrap();
    assert_eq!(counts.created, 1);
    assert_eq!(fx.inspect(|s| s.company_access_entries().unwrap()).len(), 2);

    fx.salkku_sql("UPDATE \"Authorization\" SET DENIED = 1 WHERE AUTH_ID = 1;");
    assert!(!fx.up_to_date(&task, &options));
    let (counts, _) = fx.migrate(&mut task, &options).unwrap();
    assert_eq!(counts.deleted, 1);
    let entries = fx.inspect(|s| s.company_access_entries().unwrap());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].ssn, "050505-567E");
}

#[test]
fn test_grant_for_unknown_company_follows_row_policy() {
    let fx = Fixture::new();
    fx.seed_companies();
    fx.salkku_sql(
        "INSERT INTO \"Authorization\" VALUES (1, '010101-123A', 'ZZ', NULL, NULL, 0, '2024-03-01 09:00:00');",
    );
    let options = MigrationOptions {
        row_error_policy: RowErrorPolicy::SkipRow,
        ..options()
    };
    fx.migrate(&mut CompaniesTask::new(fx.funds.clone()), &options)
        .unwrap();

    let (counts, alerts) = fx
        .migrate(&mut CompanyAccessTask::new(fx.authorizations.clone()), &options)
        .unwrap();
    assert_eq!(counts.skipped, 1);
    assert!(alerts.iter().any(|a| a.message.contains("ZZ")));
}

#[test]
fn test_kiid_funds_are_copied() {
    let fx = Fixture::new();
    fx.kiid_sql(
        "
        INSERT INTO KIID_FUND VALUES ('F1', 'https://example.test/fi.pdf', NULL, NULL, 4, 'passive', 0, '2024-04-01 08:00:00');
        INSERT INTO KIID_FUND VALUES ('F2', NULL, NULL, NULL, NULL, 'mystery', 1, '2024-04-01 08:00:00');
    ",
    );
    let options = options();
    let mut task = FundsTask::new(fx.kiid.clone());
    let (counts, alerts) = fx.migrate(&mut task, &options).unwrap();
    assert_eq!(counts.created, 2);
    assert_eq!(alerts.len(), 1);

    let f1 = fx.inspect(|s| s.find_fund("F1").unwrap()).unwrap();
    assert_eq!(f1.group, Some(FundGroup::Passive));
    assert_eq!(f1.risk_level, Some(4));
    let f2 = fx.inspect(|s| s.find_fund("F2").unwrap()).unwrap();
    assert_eq!(f2.group, None);
    assert!(f2.deprecated);
    assert!(fx.up_to_date(&task, &options));
}
