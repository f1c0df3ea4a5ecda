use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use cartera_core::audit::MemoryAuditSink;
use cartera_core::lifecycle::{cancel_loan, mark_overdue, originate_loan};
use cartera_core::loan::LoanOrigination;
use cartera_core::payment::apply::apply_payment;
use cartera_core::payment::reversal::reverse_payment;
use cartera_core::payment::{PaymentRequest, ReversalRequest};
use cartera_core::store::{InMemoryLoanStore, LoanStore};
use cartera_core::PaymentId;

use crate::input;

/// Arguments for a servicing simulation
#[derive(Args)]
pub struct SimulateArgs {
    /// Path to a JSON scenario file (or pipe the scenario via stdin)
    #[arg(long)]
    pub input: Option<String>,
}

/// A servicing scenario: one origination plus a sequence of branch events.
#[derive(Debug, Deserialize)]
pub struct Scenario {
    pub loan: LoanOrigination,
    #[serde(default)]
    pub events: Vec<ScenarioEvent>,
}

/// One action against the simulated loan.
///
/// `REVERSAL` names an earlier successful payment by zero-based index in
/// the order the scenario applied them.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioEvent {
    Payment { date: NaiveDate, amount: Decimal },
    Reversal { payment_index: usize },
    MarkOverdue { date: NaiveDate },
    Cancel,
}

pub fn run_simulate(args: SimulateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let scenario: Scenario = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <scenario.json> or stdin required for simulation".into());
    };

    let mut store = InMemoryLoanStore::new();
    let audit = MemoryAuditSink::new();
    let operator = Uuid::new_v4();

    let loan = originate_loan(&mut store, &audit, &scenario.loan, operator)?;
    let mut applied: Vec<PaymentId> = Vec::new();
    let mut timeline: Vec<Value> = Vec::new();

    for (step, event) in scenario.events.iter().enumerate() {
        // Business rejections stay on the timeline so a scenario can probe
        // them; only a malformed scenario aborts the run.
        let outcome = match event {
            ScenarioEvent::Payment { date, amount } => apply_payment(
                &mut store,
                &audit,
                &PaymentRequest {
                    loan_id: loan.id,
                    amount: *amount,
                    payment_date: *date,
                    created_by: operator,
                },
            )
            .map(|result| {
                applied.push(result.payment.id);
                json!({
                    "step": step,
                    "event": "PAYMENT",
                    "date": date,
                    "amount": amount,
                    "kind": result.payment.kind,
                    "installments_covered": result.payment.installments_covered,
                    "late_fee": result.payment.late_fee_applied,
                    "excess": result.excess,
                    "remaining_capital": result.loan_after.remaining_capital,
                    "status": result.loan_after.status,
                })
            }),
            ScenarioEvent::Reversal { payment_index } => {
                let payment_id = resolve_payment(&applied, *payment_index, step)?;
                reverse_payment(
                    &mut store,
                    &audit,
                    &ReversalRequest {
                        payment_id,
                        created_by: operator,
                        reason: None,
                    },
                )
                .map(|result| {
                    json!({
                        "step": step,
                        "event": "REVERSAL",
                        "payment_index": payment_index,
                        "remaining_capital": result.loan_after.remaining_capital,
                        "status": result.loan_after.status,
                    })
                })
            }
            ScenarioEvent::MarkOverdue { date } => {
                mark_overdue(&mut store, &audit, loan.id, *date, operator).map(|lapsed| {
                    json!({
                        "step": step,
                        "event": "MARK_OVERDUE",
                        "date": date,
                        "lapsed": lapsed,
                    })
                })
            }
            ScenarioEvent::Cancel => cancel_loan(&mut store, &audit, loan.id, operator, None)
                .map(|canceled| {
                    json!({
                        "step": step,
                        "event": "CANCEL",
                        "status": canceled.status,
                    })
                }),
        };

        match outcome {
            Ok(entry) => timeline.push(entry),
            Err(e) => timeline.push(json!({
                "step": step,
                "rejected": { "code": e.code(), "message": e.to_string() },
            })),
        }
    }

    let final_loan = store.loan(loan.id)?;
    Ok(json!({
        "loan": final_loan,
        "timeline": timeline,
        "payments": store.payments_for(loan.id)?,
        "audit_trail": audit.records(),
    }))
}

fn resolve_payment(
    applied: &[PaymentId],
    payment_index: usize,
    step: usize,
) -> Result<PaymentId, Box<dyn std::error::Error>> {
    applied.get(payment_index).copied().ok_or_else(|| {
        format!(
            "event {}: no applied payment at index {} ({} applied so far)",
            step,
            payment_index,
            applied.len()
        )
        .into()
    })
}
