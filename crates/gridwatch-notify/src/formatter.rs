//! HTML message formatting.
//!
//! Every function returns text for Telegram's HTML parse mode. Values that
//! come from bots (labels, symbols, error text) are escaped.

use crate::gateway::DigestEntry;
use gridwatch_core::{Delta, PerpGridSummary, SpacingRange, SpotGridSummary, Summary};
use gridwatch_feed::BotSnapshot;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Separator between per-bot sections.
pub fn section_separator() -> String {
    format!("\n\n{}\n\n", "\u{2500}".repeat(20))
}

/// Status block for one bot.
pub fn format_bot_status(state: &BotSnapshot) -> String {
    let label = escape_html(&state.label);
    if !state.connected {
        return format!("\u{26aa} <b>{label}</b> \u{2014} Disconnected");
    }
    match &state.summary {
        None => format!("\u{23f3} <b>{label}</b> \u{2014} No summary yet"),
        Some(Summary::SpotGrid(s)) => format_spot(state, s),
        Some(Summary::PerpGrid(s)) => format_perp(state, s),
    }
}

/// `/status` reply for all bots.
pub fn format_status_all(states: &[BotSnapshot]) -> String {
    if states.is_empty() {
        return "No bots configured.".to_string();
    }
    states
        .iter()
        .map(format_bot_status)
        .collect::<Vec<_>>()
        .join(&section_separator())
}

pub fn format_unknown_bot(label: &str, available: &[String]) -> String {
    format!(
        "Unknown bot: <code>{}</code>\nAvailable: {}",
        escape_html(label),
        escape_html(&available.join(", "))
    )
}

pub fn format_help() -> String {
    "<b>Trading Bot Monitor</b>\n\n\
     /status \u{2014} Status of all bots\n\
     /status &lt;label&gt; \u{2014} Status of a specific bot\n\
     /help \u{2014} This message"
        .to_string()
}

pub fn format_error_alert(label: &str, message: &str) -> String {
    format!(
        "\u{1f534} <b>Bot Stopped (Error): {}</b>\nREASON: <code>{}</code>",
        escape_html(label),
        escape_html(message)
    )
}

pub fn format_startup(labels: &[String]) -> String {
    format!(
        "\u{1f7e2} <b>Bot Monitor Started</b>\nWatching: {}",
        escape_html(&labels.join(", "))
    )
}

/// First-data notification for one bot.
pub fn format_initial_summary(state: &BotSnapshot) -> String {
    format!(
        "\u{1f4e1} <b>{}</b> is reporting\n\n{}",
        escape_html(&state.label),
        format_bot_status(state)
    )
}

/// Periodic digest: one section per bot, with the change since the last digest.
pub fn format_digest(entries: &[DigestEntry]) -> String {
    let sections: Vec<String> = entries
        .iter()
        .map(|entry| match &entry.delta {
            Some(delta) if entry.snapshot.connected => format!(
                "{}\n\n{}",
                format_bot_status(&entry.snapshot),
                format_delta(delta)
            ),
            _ => format_bot_status(&entry.snapshot),
        })
        .collect();

    format!(
        "\u{1f552} <b>Periodic Update</b>{}{}",
        section_separator(),
        sections.join(&section_separator())
    )
}

/// One-line change summary since the last digest.
pub fn format_delta(delta: &Delta) -> String {
    format!(
        "\u{1f4c8} <b>Since last update</b>\n\
         Trades: <code>{}</code>\n\
         Matched: <code>{}</code>\n\
         Fees: <code>${:.2}</code>",
        signed_int(delta.new_roundtrips),
        signed_money(delta.matched_delta),
        delta.fees_delta
    )
}

fn format_spot(state: &BotSnapshot, s: &SpotGridSummary) -> String {
    let (pnl_emoji, pnl_sign) = pnl_marks(s.total_profit);
    let (investment, trigger) = config_figures(state);

    format!(
        "<b>\u{1f4ca} SPOT GRID: {symbol} ({network})</b>\n\
         \u{23f1}\u{fe0f} Running for {uptime}\n\
         \u{1f504} Matched Trades: <code>{roundtrips}</code>\n\n\
         <b>\u{1f4b0} PROFIT &amp; LOSS</b>\n\
         Total: {pnl_emoji} <b>{pnl_sign}{total:.2}</b>\n\
         Matched: <b>{matched:.2}</b>\n\
         Fees: <code>${fees:.2}</code>\n\n\
         <b>\u{1f4e6} POSITION</b>\n\
         Base: <code>{base:.4}</code>\n\
         Quote: <code>${quote:.2}</code>\n\
         Init Entry: <code>{init_entry}</code>\n\n\
         <b>\u{1f4d0} GRID CONFIG</b>\n\
         Range: <code>${low} - ${high}</code>\n\
         Zones: <code>{zones}</code> ({spacing} spacing)\n\
         Trigger: <code>{trigger}</code>\n\
         Invest: <code>${investment:.2}</code>",
        symbol = escape_html(&s.symbol),
        network = network(state),
        uptime = escape_html(&s.uptime),
        roundtrips = s.roundtrips,
        total = s.total_profit,
        matched = s.matched_profit,
        fees = s.total_fees,
        base = s.position_size,
        quote = s.quote_balance,
        init_entry = optional_price(s.initial_entry_price),
        low = format_price(s.grid_range_low),
        high = format_price(s.grid_range_high),
        zones = s.grid_count,
        spacing = format_spacing(&s.grid_spacing_pct),
    )
}

fn format_perp(state: &BotSnapshot, s: &PerpGridSummary) -> String {
    let total = s.net_pnl();
    let (pnl_emoji, pnl_sign) = pnl_marks(total);
    let (investment, trigger) = config_figures(state);

    let bias_emoji = match s.grid_bias.to_lowercase().as_str() {
        "long" => "\u{1f7e2}",
        "short" => "\u{1f534}",
        _ => "\u{26aa}",
    };
    let position_emoji = match s.position_side.as_str() {
        "Long" => "\u{1f4c8}",
        "Short" => "\u{1f4c9}",
        _ => "\u{2796}",
    };
    let isolated = state.config.as_ref().is_some_and(|c| c.is_isolated());
    let margin_mode = if isolated { "Isolated" } else { "Cross" };

    format!(
        "<b>\u{1f4ca} PERP GRID: {symbol} ({network})</b>\n\
         {bias_emoji} <b>{bias}</b> ({leverage}x)\n\
         \u{23f1}\u{fe0f} Running for {uptime}\n\
         \u{1f504} Matched Trades: <code>{roundtrips}</code>\n\n\
         <b>\u{1f4b0} PROFIT &amp; LOSS</b>\n\
         Total: {pnl_emoji} <b>{pnl_sign}{total:.2}</b>\n\
         Realized: <b>{matched:.2}</b>\n\
         Unrealized: <b>{unrealized:.2}</b>\n\
         Fees: <code>${fees:.2}</code>\n\n\
         <b>\u{1f4e6} POSITION</b>\n\
         {position_emoji} <b>{side}</b>\n\
         Size: <code>{size:.4}</code>\n\
         Init Entry: <code>{init_entry}</code>\n\
         Avg Entry: <code>${avg_entry:.2}</code>\n\
         Margin: <code>${margin:.2}</code>\n\n\
         <b>\u{1f4d0} GRID CONFIG</b>\n\
         Range: <code>${low} - ${high}</code>\n\
         Zones: <code>{zones}</code> ({spacing} spacing)\n\
         Trigger: <code>{trigger}</code>\n\
         Mode: <code>{margin_mode}</code>\n\
         Invest: <code>${investment:.2}</code>",
        symbol = escape_html(&s.symbol),
        network = network(state),
        bias = escape_html(&s.grid_bias),
        leverage = s.leverage,
        uptime = escape_html(&s.uptime),
        roundtrips = s.roundtrips,
        matched = s.matched_profit,
        unrealized = s.unrealized_pnl,
        fees = s.total_fees,
        side = escape_html(&s.position_side),
        size = s.position_size.abs(),
        init_entry = optional_price(s.initial_entry_price),
        avg_entry = s.avg_entry_price,
        margin = s.margin_balance,
        low = format_price(s.grid_range_low),
        high = format_price(s.grid_range_high),
        zones = s.grid_count,
        spacing = format_spacing(&s.grid_spacing_pct),
    )
}

fn network(state: &BotSnapshot) -> String {
    state
        .info
        .as_ref()
        .map(|i| escape_html(&i.network.to_uppercase()))
        .unwrap_or_else(|| "?".to_string())
}

/// `(total_investment, trigger text)` from the strategy config.
fn config_figures(state: &BotSnapshot) -> (Decimal, String) {
    let investment = state
        .config
        .as_ref()
        .map(|c| c.total_investment())
        .unwrap_or(Decimal::ZERO);
    let trigger = state
        .config
        .as_ref()
        .and_then(|c| c.trigger_price())
        .map(|p| format!("${p:.2}"))
        .unwrap_or_else(|| "None".to_string());
    (investment, trigger)
}

fn pnl_marks(value: Decimal) -> (&'static str, &'static str) {
    if value >= Decimal::ZERO {
        ("\u{1f7e2}", "+")
    } else {
        ("\u{1f534}", "")
    }
}

fn optional_price(price: Option<Decimal>) -> String {
    price
        .map(|p| format!("${p:.2}"))
        .unwrap_or_else(|| "-".to_string())
}

fn signed_int(value: i64) -> String {
    if value >= 0 {
        format!("+{value}")
    } else {
        value.to_string()
    }
}

fn signed_money(value: Decimal) -> String {
    if value >= Decimal::ZERO {
        format!("+{value:.2}")
    } else {
        format!("{value:.2}")
    }
}

/// Price with thousands separators from 1,000 up; two decimals below.
///
/// `3500.50` -> `3,500.50`, `25000` -> `25,000`, `99.99` -> `99.99`.
pub fn format_price(price: Decimal) -> String {
    if price < Decimal::ONE_THOUSAND {
        return format!("{price:.2}");
    }
    let rounded = price.round_dp(2);
    let whole = rounded.trunc();
    let cents = ((rounded - whole) * Decimal::ONE_HUNDRED)
        .to_u64()
        .unwrap_or(0);
    let grouped = group_thousands(&whole.to_u128().unwrap_or(0).to_string());
    if cents > 0 {
        format!("{grouped}.{cents:02}")
    } else {
        grouped
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Grid spacing: a single value when min and max are within 1% of each
/// other (geometric grid), a range otherwise. Three decimals below 1%.
pub fn format_spacing(spacing: &SpacingRange) -> String {
    let (min, max) = (spacing.min_pct, spacing.max_pct);
    let decimals = if min < Decimal::ONE { 3 } else { 2 };
    let largest = min.max(max);
    let relative_diff = if largest > Decimal::ZERO {
        max.checked_sub(min)
            .and_then(|diff| diff.abs().checked_div(largest))
            .unwrap_or(Decimal::MAX)
    } else {
        Decimal::ZERO
    };

    if relative_diff < Decimal::new(1, 2) {
        format!("{min:.decimals$}%")
    } else {
        format!("{min:.decimals$}% - {max:.decimals$}%")
    }
}

/// Escape `&`, `<` and `>` for HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
