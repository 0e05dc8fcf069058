//! Message rendering and inline keyboards. All user-facing text is
//! Indonesian.

use ledger::{
    Money, WalletKind, assets, categories,
    services::{
        CategorySpend, DailyReport, MonthlyReport, PortfolioSummary, RecentTransaction,
        WeeklyReport,
    },
    wallets,
};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::parsing::format_amount;

pub(crate) fn render_menu(first_name: Option<&str>) -> (String, InlineKeyboardMarkup) {
    let name = first_name.unwrap_or("Kawan");
    let text = format!(
        "Halo {name}! 👋\nMau catat apa hari ini?\n\nKetik cepat juga bisa:\n/in 500rb gaji dari BCA\n/out 25rb makan siang"
    );
    let kb = InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("📥 Pemasukan", "menu:income"),
            InlineKeyboardButton::callback("📤 Pengeluaran", "menu:expense"),
        ],
        vec![
            InlineKeyboardButton::callback("🔁 Transfer", "menu:transfer"),
            InlineKeyboardButton::callback("💼 Kantong", "menu:wallets"),
        ],
        vec![
            InlineKeyboardButton::callback("📈 Aset", "menu:assets"),
            InlineKeyboardButton::callback("📊 Laporan", "menu:reports"),
        ],
    ]);
    (text, kb)
}

pub(crate) fn render_status(
    display_name: &str,
    wallets: &[wallets::Model],
    total: Money,
    recent: &[RecentTransaction],
) -> (String, InlineKeyboardMarkup) {
    let mut text = format!("📒 Status {display_name}\n\nTotal saldo: {total}\n");
    for wallet in wallets {
        text.push_str(&format!(
            "\n{} {}: {}",
            wallet.kind().emoji(),
            wallet.name,
            format_amount(wallet.balance)
        ));
    }

    if !recent.is_empty() {
        text.push_str("\n\nTerakhir dicatat:");
        for item in recent {
            text.push_str(&format!("\n{}", transaction_line(item)));
        }
    }

    (text, back_keyboard())
}

pub(crate) fn render_wallets(
    wallets: &[wallets::Model],
    total: Money,
) -> (String, InlineKeyboardMarkup) {
    let mut text = format!("💼 Kantong kamu\n\nTotal: {total}\n");
    for wallet in wallets {
        text.push_str(&format!(
            "\n{} {} ({}): {}",
            wallet.kind().emoji(),
            wallet.name,
            wallet.kind().label(),
            format_amount(wallet.balance)
        ));
    }

    let kb = InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("➕ Tambah kantong", "wallet:add"),
            InlineKeyboardButton::callback("🗃 Arsipkan", "wallet:archive_menu"),
        ],
        vec![InlineKeyboardButton::callback("⬅️ Menu", "nav:menu")],
    ]);
    (text, kb)
}

pub(crate) fn render_wallet_kind_picker() -> (String, InlineKeyboardMarkup) {
    let rows: Vec<Vec<InlineKeyboardButton>> = WalletKind::ALL
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|kind| {
                    InlineKeyboardButton::callback(
                        format!("{} {}", kind.emoji(), kind.label()),
                        format!("wallet:kind:{}", kind.as_str()),
                    )
                })
                .collect()
        })
        .collect();
    (
        "Kantong barunya jenis apa?".to_string(),
        InlineKeyboardMarkup::new(rows),
    )
}

/// Wallet picker rows; `prefix` decides what the callback does with the
/// chosen wallet id.
pub(crate) fn render_wallet_picker(
    title: &str,
    wallets: &[wallets::Model],
    prefix: &str,
) -> (String, InlineKeyboardMarkup) {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = wallets
        .iter()
        .map(|wallet| {
            vec![InlineKeyboardButton::callback(
                format!(
                    "{} {} ({})",
                    wallet.kind().emoji(),
                    wallet.name,
                    format_amount(wallet.balance)
                ),
                format!("{prefix}:{}", wallet.id),
            )]
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback("⬅️ Menu", "nav:menu")]);
    (title.to_string(), InlineKeyboardMarkup::new(rows))
}

pub(crate) fn render_category_picker(
    categories: &[categories::Model],
) -> (String, InlineKeyboardMarkup) {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = categories
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|category| {
                    let icon = category.icon.as_deref().unwrap_or("🏷");
                    InlineKeyboardButton::callback(
                        format!("{icon} {}", category.name),
                        format!("entry:cat:{}", category.id),
                    )
                })
                .collect()
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback(
        "Tanpa kategori",
        "entry:cat:none",
    )]);
    ("Pilih kategori:".to_string(), InlineKeyboardMarkup::new(rows))
}

pub(crate) fn render_daily_report(report: &DailyReport) -> String {
    format!(
        "📊 Laporan Harian {}\n\n📥 Pemasukan: {}\n📤 Pengeluaran: {}\n💰 Selisih: {}\n🧾 Transaksi: {}",
        report.date.format("%d-%m-%Y"),
        report.income,
        report.expense,
        signed(report.net()),
        report.transaction_count
    )
}

pub(crate) fn render_weekly_report(report: &WeeklyReport) -> String {
    let mut text = format!(
        "📊 Laporan Mingguan (mulai {})\n\n📥 Pemasukan: {}\n📤 Pengeluaran: {}\n💰 Selisih: {}",
        report.week_start.format("%d-%m-%Y"),
        report.income,
        report.expense,
        signed(report.net()),
    );
    text.push_str(&change_line(
        report.expense_change_percent,
        "minggu lalu",
        report.previous_expense,
    ));
    text
}

pub(crate) fn render_monthly_report(report: &MonthlyReport) -> String {
    let mut text = format!(
        "📊 Laporan Bulanan {}\n\n📥 Pemasukan: {}\n📤 Pengeluaran: {}\n💰 Selisih: {}",
        report.month_start.format("%m-%Y"),
        report.income,
        report.expense,
        signed(report.net()),
    );
    text.push_str(&change_line(
        report.expense_change_percent,
        "bulan lalu",
        report.previous_expense,
    ));

    if !report.top_categories.is_empty() {
        text.push_str("\n\nPengeluaran terbesar:");
        for CategorySpend { name, icon, total } in &report.top_categories {
            let icon = icon.as_deref().unwrap_or("🏷");
            text.push_str(&format!("\n{icon} {name}: {total}"));
        }
    }
    text
}

pub(crate) fn render_report_picker() -> (String, InlineKeyboardMarkup) {
    let kb = InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("Harian", "report:daily"),
            InlineKeyboardButton::callback("Mingguan", "report:weekly"),
            InlineKeyboardButton::callback("Bulanan", "report:monthly"),
        ],
        vec![InlineKeyboardButton::callback("⬅️ Menu", "nav:menu")],
    ]);
    ("Laporan mana yang mau dilihat?".to_string(), kb)
}

pub(crate) fn render_assets(
    holdings: &[assets::Model],
    summary: &PortfolioSummary,
) -> (String, InlineKeyboardMarkup) {
    let mut text = String::from("📈 Aset kamu\n");
    if holdings.is_empty() {
        text.push_str("\nBelum ada aset. Tambah lewat /tambahaset.");
    }
    for asset in holdings {
        let sync = match asset.last_sync {
            Some(at) => format!("sinkron {}", at.format("%d-%m %H:%M")),
            None => "belum sinkron".to_string(),
        };
        text.push_str(&format!(
            "\n{} {} ({})\n   Nilai: {} • Return: {} ({:+.2}%) • {}",
            asset.kind().label(),
            asset.symbol,
            asset.name,
            format_amount(asset.current_value()),
            signed(Money::new(asset.return_value())),
            asset.return_percent(),
            sync
        ));
    }
    if !holdings.is_empty() {
        text.push_str(&format!(
            "\n\nTotal nilai: {}\nTotal return: {} ({:+.2}%)",
            summary.total_value,
            signed(summary.total_return),
            summary.return_percent
        ));
    }

    let mut rows: Vec<Vec<InlineKeyboardButton>> = holdings
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|asset| {
                    InlineKeyboardButton::callback(
                        format!("🔄 {}", asset.symbol),
                        format!("asset:sync:{}", asset.id),
                    )
                })
                .collect()
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback(
        "➕ Tambah aset",
        "asset:add",
    )]);
    if !holdings.is_empty() {
        rows.push(vec![
            InlineKeyboardButton::callback("🔄 Sinkronkan semua", "asset:sync"),
            InlineKeyboardButton::callback("✏️ Ubah aset", "asset:edit"),
        ]);
        rows.push(vec![InlineKeyboardButton::callback(
            "🗑 Hapus aset",
            "asset:remove",
        )]);
    }
    rows.push(vec![InlineKeyboardButton::callback("⬅️ Menu", "nav:menu")]);
    (text, InlineKeyboardMarkup::new(rows))
}

pub(crate) fn render_asset_edit_picker(
    holdings: &[assets::Model],
) -> (String, InlineKeyboardMarkup) {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = holdings
        .iter()
        .map(|asset| {
            vec![InlineKeyboardButton::callback(
                format!("{} ({} @ {})", asset.symbol, asset.quantity, format_amount(asset.buy_price)),
                format!("asset:editsel:{}", asset.id),
            )]
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback("⬅️ Menu", "nav:menu")]);
    (
        "Aset mana yang mau diubah?".to_string(),
        InlineKeyboardMarkup::new(rows),
    )
}

/// The chosen wallet rides along in the callback data so the kind step does
/// not need session state.
pub(crate) fn render_asset_kind_picker(wallet_id: i32) -> (String, InlineKeyboardMarkup) {
    let kb = InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("📈 Saham", format!("asset:kind:{wallet_id}:stock")),
        InlineKeyboardButton::callback("🪙 Kripto", format!("asset:kind:{wallet_id}:crypto")),
    ]]);
    ("Jenis asetnya apa?".to_string(), kb)
}

pub(crate) fn render_asset_field_picker(asset: &assets::Model) -> (String, InlineKeyboardMarkup) {
    let kb = InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("Jumlah", format!("asset:field:{}:quantity", asset.id)),
            InlineKeyboardButton::callback(
                "Harga beli",
                format!("asset:field:{}:price", asset.id),
            ),
        ],
        vec![
            InlineKeyboardButton::callback("Nama", format!("asset:field:{}:name", asset.id)),
            InlineKeyboardButton::callback("⬅️ Menu", "nav:menu"),
        ],
    ]);
    (
        format!(
            "Apa yang mau diubah dari {}? (sekarang {} @ {})",
            asset.symbol,
            asset.quantity,
            format_amount(asset.buy_price)
        ),
        kb,
    )
}

pub(crate) fn render_asset_remove_picker(
    holdings: &[assets::Model],
) -> (String, InlineKeyboardMarkup) {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = holdings
        .iter()
        .map(|asset| {
            vec![InlineKeyboardButton::callback(
                format!("{} {}", asset.kind().label(), asset.symbol),
                format!("asset:del:{}", asset.id),
            )]
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback("⬅️ Menu", "nav:menu")]);
    (
        "Aset mana yang mau dihapus?".to_string(),
        InlineKeyboardMarkup::new(rows),
    )
}

pub(crate) fn transaction_line(item: &RecentTransaction) -> String {
    let tx = &item.transaction;
    let sign = match tx.kind().unwrap_or(ledger::TransactionKind::Expense) {
        ledger::TransactionKind::Income => "📥",
        ledger::TransactionKind::Expense => "📤",
        ledger::TransactionKind::Transfer => "🔁",
    };
    format!(
        "{sign} {} • {}{}{}",
        tx.occurred_at.format("%d-%m"),
        format_amount(tx.amount),
        item.category_name
            .as_deref()
            .map(|c| format!(" • {c}"))
            .unwrap_or_default(),
        tx.description
            .as_deref()
            .map(|d| format!(" • {d}"))
            .unwrap_or_default(),
    )
}

pub(crate) fn back_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "⬅️ Menu",
        "nav:menu",
    )]])
}

fn signed(amount: Money) -> String {
    if amount.is_negative() {
        amount.to_string()
    } else {
        format!("+{amount}")
    }
}

fn change_line(change: Option<f64>, period: &str, previous: Money) -> String {
    match change {
        Some(percent) => format!(
            "\n\nDibanding {period}: {percent:+.1}% (sebelumnya {previous})"
        ),
        None => format!("\n\nBelum ada data {period} untuk dibandingkan."),
    }
}
