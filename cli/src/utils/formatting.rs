//! Output formatting utilities for the Degen CLI

use crate::config::DegenCliConfig;
use degen_sdk::{
    format_duration, format_timestamp, format_usdc, FeeQuote, PendingStage, SessionStatus, Step,
    SubscriptionRecord, SubscriptionStatus,
};
use serde_json::{json, Value};
use std::fmt::Write;

/// Human and JSON renderings of one command result
#[derive(Debug, Clone)]
pub struct Report {
    pub human: String,
    pub data: Value,
}

fn active_label(active: Option<bool>, in_grace_period: Option<bool>) -> &'static str {
    match (active, in_grace_period) {
        (Some(true), _) => "Active",
        (Some(false), Some(true)) => "Expired (grace period)",
        (Some(false), Some(false)) => "Expired",
        (None, _) | (Some(false), None) => "Unknown",
    }
}

fn optional_usdc(amount: Option<u64>) -> String {
    amount.map_or_else(|| "unknown".to_string(), |a| format!("{} USDC", format_usdc(a)))
}

fn write_record(output: &mut String, record: &SubscriptionRecord) {
    writeln!(output, "Telegram:         @{}", record.identity).ok();
    writeln!(output, "Expires:          {}", format_timestamp(record.expires_at)).ok();
    writeln!(output, "Periods paid:     {}", record.payment_count).ok();
    writeln!(
        output,
        "Total paid:       {} USDC",
        format_usdc(record.total_paid)
    )
    .ok();
    writeln!(
        output,
        "Average payment:  {} USDC",
        format_usdc(record.average_payment())
    )
    .ok();
}

fn record_json(record: Option<&SubscriptionRecord>, config: &DegenCliConfig) -> Value {
    record.map_or(Value::Null, |record| {
        json!({
            "identity": record.identity,
            "expires_at": record.expires_at,
            "expires": format_timestamp(record.expires_at),
            "payment_count": record.payment_count,
            "total_paid": record.total_paid,
            "total_paid_usdc": config.usdc_amount(record.total_paid),
            "average_payment_usdc": config.usdc_amount(record.average_payment()),
        })
    })
}

/// Format the acting wallet's status
#[must_use]
pub fn format_status(
    status: &SessionStatus,
    period_secs: Option<i64>,
    config: &DegenCliConfig,
) -> Report {
    let mut human = format!("Wallet: {}\n\n", status.account);

    match status.record.as_ref().filter(|r| r.has_identity()) {
        Some(record) => {
            writeln!(
                human,
                "Status:           {}",
                active_label(status.active, status.in_grace_period)
            )
            .ok();
            write_record(&mut human, record);
        }
        None => human.push_str("No subscription yet.\n"),
    }

    human.push('\n');
    writeln!(human, "USDC balance:     {}", optional_usdc(status.balance)).ok();
    writeln!(human, "Authorized:       {}", optional_usdc(status.allowance)).ok();
    writeln!(human, "Standard fee:     {}", optional_usdc(status.standard_fee)).ok();
    if let Some(quote) = &status.quote {
        if quote.discounted {
            writeln!(human, "Discounted price: {} USDC", format_usdc(quote.fee)).ok();
        }
    }
    if let Some(period) = period_secs.and_then(|p| u64::try_from(p).ok()) {
        write!(
            human,
            "Renewal extends the current expiry by {}",
            format_duration(period)
        )
        .ok();
    }

    let data = json!({
        "account": status.account,
        "active": status.active,
        "in_grace_period": status.in_grace_period,
        "subscription": record_json(status.record.as_ref(), config),
        "balance": status.balance,
        "allowance": status.allowance,
        "standard_fee": status.standard_fee,
        "fee": status.quote.map(|q| q.fee),
        "period_secs": period_secs,
    });

    Report {
        human: human.trim_end().to_string(),
        data,
    }
}

/// Format a resolved fee
#[must_use]
pub fn format_quote(identity: &str, quote: &FeeQuote, config: &DegenCliConfig) -> Report {
    let mut human = format!(
        "Subscription fee for @{identity}: {} USDC",
        format_usdc(quote.fee)
    );
    if quote.discounted {
        if let Some(standard) = quote.standard_fee {
            write!(human, "\nStandard fee: {} USDC", format_usdc(standard)).ok();
        }
    }
    if quote.above_standard {
        human.push_str("\nWarning: the price for this username is above the standard fee");
    }

    Report {
        human,
        data: json!({
            "identity": identity,
            "fee": quote.fee,
            "fee_usdc": config.usdc_amount(quote.fee),
            "standard_fee": quote.standard_fee,
            "discounted": quote.discounted,
            "above_standard": quote.above_standard,
        }),
    }
}

/// Format another account's subscription
#[must_use]
pub fn format_lookup(status: &SubscriptionStatus, config: &DegenCliConfig) -> Report {
    let mut human = format!("Account: {}\n\n", status.account);
    match status.record.as_ref().filter(|r| r.has_identity()) {
        Some(record) => {
            writeln!(
                human,
                "Status:           {}",
                active_label(Some(status.active), Some(status.in_grace_period))
            )
            .ok();
            write_record(&mut human, record);
        }
        None => human.push_str("No subscription found for this account"),
    }

    Report {
        human: human.trim_end().to_string(),
        data: json!({
            "account": status.account,
            "active": status.active,
            "in_grace_period": status.in_grace_period,
            "subscription": record_json(status.record.as_ref(), config),
        }),
    }
}

/// Format the outcome of a subscribe or renew run
#[must_use]
pub fn format_step(step: &Step) -> Report {
    match step {
        Step::Submitted {
            action,
            signature,
            resumed,
        } => Report {
            human: format!(
                "{} submitted for @{}{}\nTransaction signature: {signature}",
                if action.kind() == "renew" {
                    "Renewal"
                } else {
                    "Subscription"
                },
                action.identity(),
                if *resumed { " after USDC approval" } else { "" },
            ),
            data: json!({
                "state": "submitted",
                "action": action,
                "signature": signature.to_string(),
                "resumed_after_approval": resumed,
            }),
        },
        Step::StillPending { stage } => {
            let detail = match stage {
                PendingStage::ApprovalConfirmation => {
                    "The USDC approval has not confirmed yet"
                }
                PendingStage::Allowance => {
                    "The USDC approval confirmed but is not visible yet"
                }
            };
            Report {
                human: format!(
                    "{detail}. No payment was made. Check back with `degen-cli status` and run the command again."
                ),
                data: json!({ "state": "still_pending", "stage": stage }),
            }
        }
        Step::ApprovalSubmitted { signature, amount } => Report {
            human: format!(
                "USDC approval for {} USDC submitted: {signature}",
                format_usdc(*amount)
            ),
            data: json!({
                "state": "approval_submitted",
                "signature": signature.to_string(),
                "amount": amount,
            }),
        },
        Step::Idle => Report {
            human: "Nothing to do".to_string(),
            data: json!({ "state": "idle" }),
        },
    }
}

/// Report for a run interrupted with Ctrl-C
#[must_use]
pub fn format_abandoned() -> Report {
    Report {
        human: "Stopped waiting. Transactions already sent will still complete on their own."
            .to_string(),
        data: json!({ "state": "abandoned" }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use degen_sdk::{solana_sdk::signature::Signature, PayingAction};

    fn record() -> SubscriptionRecord {
        SubscriptionRecord {
            identity: "dave".to_string(),
            expires_at: 0,
            total_paid: 30_000_000,
            payment_count: 2,
        }
    }

    #[test]
    fn test_status_shows_average_and_discount() {
        let status = SessionStatus {
            account: "wallet".to_string(),
            identity: Some("dave".to_string()),
            record: Some(record()),
            active: Some(false),
            in_grace_period: Some(true),
            balance: Some(100_000_000),
            allowance: None,
            standard_fee: Some(20_000_000),
            quote: Some(FeeQuote {
                fee: 5_000_000,
                standard_fee: Some(20_000_000),
                discounted: true,
                above_standard: false,
            }),
        };

        let report = format_status(&status, Some(2_592_000), &DegenCliConfig::new());
        assert!(report.human.contains("Expired (grace period)"));
        assert!(report.human.contains("Average payment:  15.00 USDC"));
        assert!(report.human.contains("Discounted price: 5.00 USDC"));
        assert!(report.human.contains("Authorized:       unknown"));
        assert!(report.human.contains("30d 0h 0m 0s"));
        assert_eq!(report.data["fee"], 5_000_000);
    }

    #[test]
    fn test_status_without_subscription() {
        let status = SessionStatus {
            account: "wallet".to_string(),
            identity: None,
            record: None,
            active: None,
            in_grace_period: None,
            balance: Some(0),
            allowance: Some(0),
            standard_fee: Some(15_000_000),
            quote: None,
        };
        let report = format_status(&status, None, &DegenCliConfig::new());
        assert!(report.human.contains("No subscription yet."));
        assert!(report.data["subscription"].is_null());
    }

    #[test]
    fn test_unknown_activity_is_not_reported_active() {
        assert_eq!(active_label(None, Some(false)), "Unknown");
        assert_eq!(active_label(Some(false), None), "Unknown");
        assert_eq!(active_label(Some(true), None), "Active");
    }

    #[test]
    fn test_quote_flags_price_above_standard() {
        let quote = FeeQuote {
            fee: 25_000_000,
            standard_fee: Some(20_000_000),
            discounted: true,
            above_standard: true,
        };
        let report = format_quote("erin", &quote, &DegenCliConfig::new());
        assert!(report.human.starts_with("Subscription fee for @erin: 25.00 USDC"));
        assert!(report.human.contains("Standard fee: 20.00 USDC"));
        assert!(report.human.contains("Warning"));
    }

    #[test]
    fn test_submitted_step() {
        let step = Step::Submitted {
            action: PayingAction::Renew {
                identity: "dave".to_string(),
            },
            signature: Signature::default(),
            resumed: true,
        };
        let report = format_step(&step);
        assert!(report
            .human
            .starts_with("Renewal submitted for @dave after USDC approval"));
        assert_eq!(report.data["action"]["kind"], "renew");
    }
}
