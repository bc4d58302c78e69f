//! CLI commands

use flashpool_bus::{Collaborators, JournalEntry, JournalStore, LogNotifier};
use flashpool_core::{Amount, Chain, PoolId};
use flashpool_engine::{EngineConfig, FlashLoanEngine};
use flashpool_ledger::LoanState;
use std::sync::Arc;
use std::time::Duration;

/// Collaborators for an operator session: tracing notifier, plus the
/// journal when `journal_dir` is configured.
fn collaborators(config: &EngineConfig) -> anyhow::Result<Collaborators> {
    let collaborators = Collaborators::new().with_notifier(Arc::new(LogNotifier));

    let Some(dir) = &config.journal_dir else {
        return Ok(collaborators);
    };

    let journal = Arc::new(JournalStore::new(dir)?);
    Ok(collaborators
        .with_loan_store(journal.clone())
        .with_pool_store(journal.clone())
        .with_notifier(journal))
}

/// Validate the config and summarize it
pub fn check(config: &EngineConfig) -> anyhow::Result<()> {
    println!("✅ Config valid");
    println!("   max duration:  {}s", config.max_duration_secs);
    println!("   overpayment:   {:?}", config.overpayment);
    println!(
        "   delivery:      {} attempts, {}ms backoff",
        config.delivery_max_attempts, config.delivery_backoff_ms
    );
    match &config.journal_dir {
        Some(dir) => println!("   journal:       {}", dir.display()),
        None => println!("   journal:       disabled"),
    }
    println!("   seed pools:    {}", config.pools.len());
    Ok(())
}

/// List pools
pub fn pools(config: EngineConfig, chain: Option<&str>, json: bool) -> anyhow::Result<()> {
    let chain: Option<Chain> = chain.map(str::parse).transpose()?;
    let engine = FlashLoanEngine::new(config, Collaborators::new())?;
    let pools = engine.list_pools(chain.as_ref());

    if json {
        println!("{}", serde_json::to_string_pretty(&pools)?);
        return Ok(());
    }

    if pools.is_empty() {
        println!("No pools configured");
        return Ok(());
    }

    println!(
        "{:<8} {:<8} {:<8} {:>16} {:>16} {:>8} {:>8}",
        "ID", "CHAIN", "TOKEN", "TOTAL", "MAX LOANABLE", "FEE", "RATIO"
    );
    for pool in pools {
        println!(
            "{:<8} {:<8} {:<8} {:>16} {:>16} {:>8} {:>8}",
            pool.id.to_string(),
            pool.chain.to_string(),
            pool.token.to_string(),
            pool.total_liquidity.to_string(),
            pool.max_loanable()?.to_string(),
            pool.fee_rate.to_string(),
            pool.max_loan_ratio.to_string(),
        );
    }
    Ok(())
}

pub struct SimulationPlan {
    pub pool: u64,
    pub borrowers: u32,
    pub principal: u64,
    pub duration: u64,
    pub repay_every: u32,
}

/// Admit a batch of loans, repay some and let the rest default
pub async fn simulate(config: EngineConfig, plan: SimulationPlan) -> anyhow::Result<()> {
    let collaborators = collaborators(&config)?;
    let engine = FlashLoanEngine::new(config, collaborators)?;
    let pool_id = PoolId::new(plan.pool);
    let principal = Amount::new(plan.principal);

    // Surfaces NotFound before any borrower runs
    let before = engine.pool(pool_id)?;
    tracing::info!(
        pool_id = %pool_id,
        borrowers = plan.borrowers,
        principal = %principal,
        duration = plan.duration,
        "Simulation started"
    );

    let mut admitted = Vec::new();
    let mut rejected = 0u32;
    for i in 0..plan.borrowers {
        let borrower = format!("borrower-{}", i + 1);
        match engine.request_loan(pool_id, principal, plan.duration, &borrower) {
            Ok(receipt) => admitted.push((i, receipt)),
            Err(e) => {
                rejected += 1;
                println!("❌ {}: {}", borrower, e);
            }
        }
    }

    let mut repaid = 0u32;
    for (i, receipt) in &admitted {
        if plan.repay_every > 0 && (i + 1) % plan.repay_every == 0 {
            engine.repay(receipt.loan_id, receipt.repayment_due)?;
            repaid += 1;
        }
    }

    if engine.active_loans() > 0 {
        println!(
            "⏳ Waiting {}s for {} unpaid loans to expire...",
            plan.duration,
            engine.active_loans()
        );
        tokio::time::sleep(Duration::from_secs(plan.duration) + Duration::from_millis(500)).await;
    }

    let defaulted = admitted
        .iter()
        .filter(|(_, r)| {
            engine
                .get_loan(r.loan_id)
                .map_or(false, |l| l.state == LoanState::Defaulted)
        })
        .count();

    engine.shutdown().await;
    let after = engine.pool(pool_id)?;

    println!("✅ Simulation finished on {} ({}/{})", pool_id, after.chain, after.token);
    println!("   admitted:  {}", admitted.len());
    println!("   rejected:  {}", rejected);
    println!("   repaid:    {}", repaid);
    println!("   defaulted: {}", defaulted);
    println!(
        "   total:     {} -> {}",
        before.total_liquidity, after.total_liquidity
    );
    println!("   reserved:  {}", after.reserved_liquidity);
    println!("   fees:      {}", after.fees_earned);
    Ok(())
}

/// Print journal records
pub fn journal(config: &EngineConfig, limit: Option<usize>) -> anyhow::Result<()> {
    let Some(dir) = &config.journal_dir else {
        anyhow::bail!("No journal_dir configured");
    };

    let records = JournalStore::new(dir)?.read_all()?;
    let skip = limit.map_or(0, |n| records.len().saturating_sub(n));

    for record in records.iter().skip(skip) {
        let line = match &record.entry {
            JournalEntry::Loan(loan) => format!(
                "loan   {} {} {} principal={} fee={}",
                loan.id(),
                loan.state,
                loan.loan.borrower,
                loan.loan.principal,
                loan.loan.fee
            ),
            JournalEntry::Pool(pool) => format!(
                "pool   {} total={} reserved={} fees={}",
                pool.id, pool.total_liquidity, pool.reserved_liquidity, pool.fees_earned
            ),
            JournalEntry::Event(event) => format!("event  {}", serde_json::to_string(event)?),
        };
        println!("{} {}", record.recorded_at.format("%Y-%m-%d %H:%M:%S%.3f"), line);
    }

    println!("📒 {} records", records.len() - skip);
    Ok(())
}
