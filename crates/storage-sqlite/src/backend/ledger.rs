//! Ledger stores: portfolio logs and portfolio transactions.

use diesel::prelude::*;

use super::model::{
    PortfolioLogDB, PortfolioLogLineRow, PortfolioTransactionDB, PortfolioTransactionLineRow,
};
use super::session::SqliteBackendSession;
use crate::errors::IntoCore;
use crate::schema::{portfolio_logs, portfolio_transactions};
use crate::utils::{chunk_for_sqlite, micro_sum, minute_sum};
use fundsync_core::backend::{
    PortfolioLog, PortfolioLogStore, PortfolioTransaction, PortfolioTransactionStore,
};
use fundsync_core::errors::Result;
use fundsync_core::migration::{
    DatasetStamp, PartitionChecksum, PortfolioLogLine, PortfolioTransactionLine,
};

const PORTFOLIO_LOG_LINES: &str = "
    SELECT l.transaction_number, s.original_id AS security_code,
           p.original_id AS portfolio_code, cs.original_id AS c_security_code,
           cc.original_id AS c_company_code, l.transaction_code, l.transaction_date,
           l.payment_date, l.amount, l.c_amount, l.unit_price, l.purchase_value,
           l.total_value, l.status, l.updated
    FROM portfolio_logs l
    JOIN securities s ON s.id = l.security_id
    JOIN portfolios p ON p.id = l.portfolio_id
    LEFT JOIN securities cs ON cs.id = l.c_security_id
    LEFT JOIN companies cc ON cc.id = l.c_company_id
    WHERE s.original_id = ?
    ORDER BY l.transaction_number";

const PORTFOLIO_TRANSACTION_LINES: &str = "
    SELECT t.transaction_number, s.original_id AS security_code,
           p.original_id AS portfolio_code, t.amount, t.purchase_value, t.purchase_date,
           t.updated
    FROM portfolio_transactions t
    JOIN securities s ON s.id = t.security_id
    JOIN portfolios p ON p.id = t.portfolio_id
    WHERE s.original_id = ?
    ORDER BY t.transaction_number";

impl PortfolioLogStore for SqliteBackendSession {
    fn portfolio_log_stamp(&mut self) -> Result<DatasetStamp> {
        self.stamp_of("portfolio_logs")
    }

    fn find_portfolio_log(&mut self, transaction_number: i64) -> Result<Option<PortfolioLog>> {
        portfolio_logs::table
            .filter(portfolio_logs::transaction_number.eq(transaction_number))
            .select(PortfolioLogDB::as_select())
            .first::<PortfolioLogDB>(self.conn())
            .optional()
            .into_core()?
            .map(PortfolioLog::try_from)
            .transpose()
    }

    fn insert_portfolio_log(&mut self, log: &PortfolioLog) -> Result<()> {
        diesel::insert_into(portfolio_logs::table)
            .values(PortfolioLogDB::from(log))
            .execute(self.conn())
            .into_core()?;
        Ok(())
    }

    fn update_portfolio_log(&mut self, log: &PortfolioLog) -> Result<()> {
        let db = PortfolioLogDB::from(log);
        diesel::update(portfolio_logs::table.find(&db.id))
            .set(&db)
            .execute(self.conn())
            .into_core()?;
        Ok(())
    }

    fn portfolio_log_numbers(&mut self) -> Result<Vec<i64>> {
        portfolio_logs::table
            .select(portfolio_logs::transaction_number)
            .load::<i64>(self.conn())
            .into_core()
    }

    fn portfolio_log_checksums(&mut self) -> Result<Vec<PartitionChecksum>> {
        let sql = format!(
            "SELECT s.original_id AS partition, COUNT(*) AS row_count,
                    {} AS amount_micros, {} AS value_micros, {} AS minutes
             FROM portfolio_logs l JOIN securities s ON s.id = l.security_id
             GROUP BY s.original_id ORDER BY s.original_id",
            micro_sum("l.amount"),
            micro_sum("l.total_value"),
            minute_sum("l.payment_date")
        );
        self.checksums_by_query(&sql)
    }

    fn portfolio_log_lines(&mut self, security_code: &str) -> Result<Vec<PortfolioLogLine>> {
        self.load_for_security::<PortfolioLogLineRow>(PORTFOLIO_LOG_LINES, security_code)?
            .into_iter()
            .map(PortfolioLogLine::try_from)
            .collect()
    }

    fn delete_portfolio_log(&mut self, transaction_number: i64) -> Result<bool> {
        let deleted = diesel::delete(
            portfolio_logs::table.filter(portfolio_logs::transaction_number.eq(transaction_number)),
        )
        .execute(self.conn())
        .into_core()?;
        Ok(deleted > 0)
    }
}

impl PortfolioTransactionStore for SqliteBackendSession {
    fn portfolio_transaction_stamp(&mut self) -> Result<DatasetStamp> {
        self.stamp_of("portfolio_transactions")
    }

    fn find_portfolio_transaction(
        &mut self,
        transaction_number: i64,
    ) -> Result<Option<PortfolioTransaction>> {
        portfolio_transactions::table
            .filter(portfolio_transactions::transaction_number.eq(transaction_number))
            .select(PortfolioTransactionDB::as_select())
            .first::<PortfolioTransactionDB>(self.conn())
            .optional()
            .into_core()?
            .map(PortfolioTransaction::try_from)
            .transpose()
    }

    fn insert_portfolio_transaction(&mut self, transaction: &PortfolioTransaction) -> Result<()> {
        diesel::insert_into(portfolio_transactions::table)
            .values(PortfolioTransactionDB::from(transaction))
            .execute(self.conn())
            .into_core()?;
        Ok(())
    }

    fn update_portfolio_transaction(&mut self, transaction: &PortfolioTransaction) -> Result<()> {
        let db = PortfolioTransactionDB::from(transaction);
        diesel::update(portfolio_transactions::table.find(&db.id))
            .set(&db)
            .execute(self.conn())
            .into_core()?;
        Ok(())
    }

    fn portfolio_transaction_numbers(&mut self) -> Result<Vec<i64>> {
        portfolio_transactions::table
            .select(portfolio_transactions::transaction_number)
            .load::<i64>(self.conn())
            .into_core()
    }

    fn delete_portfolio_transactions(&mut self, transaction_numbers: &[i64]) -> Result<usize> {
        let mut deleted = 0;
        for chunk in chunk_for_sqlite(transaction_numbers) {
            deleted += diesel::delete(
                portfolio_transactions::table
                    .filter(portfolio_transactions::transaction_number.eq_any(chunk)),
            )
            .execute(self.conn())
            .into_core()?;
        }
        Ok(deleted)
    }

    fn portfolio_transaction_checksums(&mut self) -> Result<Vec<PartitionChecksum>> {
        let sql = format!(
            "SELECT s.original_id AS partition, COUNT(*) AS row_count,
                    {} AS amount_micros, {} AS value_micros, {} AS minutes
             FROM portfolio_transactions t JOIN securities s ON s.id = t.security_id
             GROUP BY s.original_id ORDER BY s.original_id",
            micro_sum("t.amount"),
            micro_sum("t.purchase_value"),
            minute_sum("t.purchase_date")
        );
        self.checksums_by_query(&sql)
    }

    fn portfolio_transaction_lines(
        &mut self,
        security_code: &str,
    ) -> Result<Vec<PortfolioTransactionLine>> {
        self.load_for_security::<PortfolioTransactionLineRow>(
            PORTFOLIO_TRANSACTION_LINES,
            security_code,
        )?
        .into_iter()
        .map(PortfolioTransactionLine::try_from)
        .collect()
    }
}
