//! Plain-text receipt rendering.
//!
//! Produces a fixed-width text receipt for a finalized order, suitable
//! for display or for handing to a line printer. Amounts are rendered
//! with dot thousands separators and no decimals, VND style.

use crate::models::{Order, OrderStatus, PaymentEntry};

const WIDTH: usize = 42;

/// Format an amount like `1.500.000`. Negative amounts keep their sign.
pub fn format_money(amount: f64) -> String {
    let rounded = amount.round() as i64;
    let digits = rounded.abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    let first_group = digits.len() % 3;
    for (i, ch) in digits.chars().enumerate() {
        if i != 0 && (i + 3 - first_group) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    if rounded < 0 {
        format!("-{out}")
    } else {
        out
    }
}

fn divider() -> String {
    "-".repeat(WIDTH)
}

/// Left label, right-aligned value, padded to the receipt width.
fn row(label: &str, value: &str) -> String {
    let pad = WIDTH.saturating_sub(label.chars().count() + value.chars().count());
    format!("{label}{}{value}", " ".repeat(pad))
}

fn centered(text: &str) -> String {
    let len = text.chars().count();
    if len >= WIDTH {
        return text.to_string();
    }
    let left = (WIDTH - len) / 2;
    format!("{}{text}", " ".repeat(left))
}

/// Render an order and its payment history as a text receipt.
pub fn render_text(order: &Order, payments: &[PaymentEntry], store_name: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push(centered(store_name));
    lines.push(centered(&order.order_number));
    lines.push(centered(&order.created_at));
    lines.push(divider());

    lines.push(row("Khách hàng", &order.customer_name));
    lines.push(divider());

    for item in &order.items {
        lines.push(item.name.clone());
        lines.push(row(
            &format!("  {} x {}", item.quantity, format_money(item.unit_price)),
            &format_money(item.line_total()),
        ));
        if let Some(note) = &item.note {
            lines.push(format!("  ({note})"));
        }
    }
    lines.push(divider());

    lines.push(row("Tạm tính", &format_money(order.subtotal)));
    if order.discount > 0.0 {
        lines.push(row("Giảm giá", &format!("-{}", format_money(order.discount))));
    }
    if let Some(code) = &order.voucher_code {
        lines.push(row(
            &format!("Voucher {code}"),
            &format!("-{}", format_money(order.voucher_discount)),
        ));
    }
    if order.tip > 0.0 {
        lines.push(row("Tip", &format_money(order.tip)));
    }
    lines.push(row("TỔNG CỘNG", &format_money(order.total)));
    lines.push(divider());

    for payment in payments {
        lines.push(row(
            &format!("Thanh toán ({})", payment.method.as_str()),
            &format_money(payment.amount),
        ));
    }
    lines.push(row("Đã nhận", &format_money(order.received_amount)));
    if order.status == OrderStatus::Completed {
        lines.push(row("Tiền thối", &format_money(order.change_amount.max(0.0))));
    } else {
        lines.push(row("Còn lại", &format_money(-order.change_amount)));
    }

    if let Some(note) = &order.note {
        lines.push(divider());
        lines.push(format!("Ghi chú: {note}"));
    }

    lines.push(divider());
    lines.push(centered("Cảm ơn quý khách!"));

    lines.join("\n")
}

// ===========================================================================
// Tests
// ===========================================================================
