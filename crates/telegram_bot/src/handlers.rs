use ledger::{
    AssetKind, CategoryKind, LedgerError, Money, TransactionKind, WalletKind,
    services::{AssetUpdate, NewAsset, NewTransaction, NewWallet, TelegramProfile, TransactionFilter},
    users, wallets,
};
use teloxide::{
    prelude::*,
    types::{CallbackQuery, ChatId, InlineKeyboardMarkup, InputFile, User},
};

use crate::{
    ConfigParameters,
    parsing::{self, ParseError, format_amount},
    state::{AssetField, EntryDraft, PendingAction, Session},
    ui,
};

pub(crate) async fn handle_message(
    bot: Bot,
    msg: Message,
    cfg: ConfigParameters,
) -> ResponseResult<()> {
    if !is_allowed(&cfg, msg.from.as_ref()) {
        return Ok(());
    }

    let Some(from) = msg.from.as_ref() else {
        bot.send_message(msg.chat.id, "Tidak bisa mengenali pengirim pesan.")
            .await?;
        return Ok(());
    };
    let profile = telegram_profile(from);
    let chat_id = msg.chat.id;

    // Wizard input takes priority over command parsing.
    if let Some(pending) = cfg.sessions.get(chat_id).await.pending
        && handle_pending_message(&bot, &msg, &cfg, &profile, pending).await?
    {
        return Ok(());
    }

    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(command) = parse_command(text) else {
        return Ok(());
    };

    match command {
        Command::Start => {
            match cfg.registration.register(&profile).await {
                Ok((user, true)) => {
                    bot.send_message(chat_id, welcome_text(&user)).await?;
                }
                Ok((user, false)) => {
                    let days = cfg
                        .registration
                        .days_registered(profile.telegram_id)
                        .await
                        .unwrap_or_default()
                        .unwrap_or(0);
                    bot.send_message(
                        chat_id,
                        format!(
                            "Selamat datang kembali, {}! 👋 Sudah {days} hari mencatat bareng.",
                            user.display_name()
                        ),
                    )
                    .await?;
                }
                Err(err) => {
                    bot.send_message(chat_id, user_message_for_error(&err))
                        .await?;
                    return Ok(());
                }
            }
            show_menu(&bot, chat_id, &cfg, &profile).await?;
        }
        Command::Help => {
            bot.send_message(chat_id, help_text()).await?;
        }
        Command::Menu => {
            show_menu(&bot, chat_id, &cfg, &profile).await?;
        }
        Command::Status => {
            let Some(user) = require_user(&bot, chat_id, &cfg, &profile).await? else {
                return Ok(());
            };
            show_status(&bot, chat_id, &cfg, &user).await?;
        }
        Command::Saldo => {
            let Some(user) = require_user(&bot, chat_id, &cfg, &profile).await? else {
                return Ok(());
            };
            show_wallets(&bot, chat_id, &cfg, user.id).await?;
        }
        Command::In(rest) => {
            let Some(user) = require_user(&bot, chat_id, &cfg, &profile).await? else {
                return Ok(());
            };
            quick_entry(&bot, chat_id, &cfg, &user, TransactionKind::Income, &rest).await?;
        }
        Command::Out(rest) => {
            let Some(user) = require_user(&bot, chat_id, &cfg, &profile).await? else {
                return Ok(());
            };
            quick_entry(&bot, chat_id, &cfg, &user, TransactionKind::Expense, &rest).await?;
        }
        Command::Transfer(rest) => {
            let Some(user) = require_user(&bot, chat_id, &cfg, &profile).await? else {
                return Ok(());
            };
            if rest.trim().is_empty() {
                cfg.sessions
                    .update(chat_id, |s| s.pending = Some(PendingAction::Transfer))
                    .await;
                bot.send_message(chat_id, transfer_usage()).await?;
                return Ok(());
            }
            run_transfer(&bot, chat_id, &cfg, &user, &rest).await?;
        }
        Command::Aset => {
            let Some(user) = require_user(&bot, chat_id, &cfg, &profile).await? else {
                return Ok(());
            };
            show_assets(&bot, chat_id, &cfg, user.id).await?;
        }
        Command::TambahAset => {
            let Some(user) = require_user(&bot, chat_id, &cfg, &profile).await? else {
                return Ok(());
            };
            start_asset_flow(&bot, chat_id, &cfg, user.id).await?;
        }
        Command::Report(period) => {
            let Some(user) = require_user(&bot, chat_id, &cfg, &profile).await? else {
                return Ok(());
            };
            match period.trim().to_lowercase().as_str() {
                "" => {
                    let (text, kb) = ui::render_report_picker();
                    edit_or_send(&bot, chat_id, &cfg, text, kb).await?;
                }
                "harian" | "daily" => show_daily_report(&bot, chat_id, &cfg, user.id).await?,
                "mingguan" | "weekly" => show_weekly_report(&bot, chat_id, &cfg, user.id).await?,
                "bulanan" | "monthly" => show_monthly_report(&bot, chat_id, &cfg, user.id).await?,
                _ => {
                    bot.send_message(chat_id, "Pilihan: /report harian | mingguan | bulanan")
                        .await?;
                }
            }
        }
        Command::Export => {
            let Some(user) = require_user(&bot, chat_id, &cfg, &profile).await? else {
                return Ok(());
            };
            export_transactions(&bot, chat_id, &cfg, user.id).await?;
        }
    }

    Ok(())
}

pub(crate) async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    cfg: ConfigParameters,
) -> ResponseResult<()> {
    if !is_allowed(&cfg, Some(&q.from)) {
        return Ok(());
    }

    let Some(message) = q.message.as_ref() else {
        return Ok(());
    };
    let chat_id = message.chat().id;
    let profile = telegram_profile(&q.from);

    let _ = bot.answer_callback_query(q.id.clone()).await;

    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };

    let Some(user) = require_user(&bot, chat_id, &cfg, &profile).await? else {
        return Ok(());
    };

    if data == "nav:menu" {
        cfg.sessions.update(chat_id, Session::clear_flow).await;
        show_menu(&bot, chat_id, &cfg, &profile).await?;
    } else if data == "menu:income" {
        cfg.sessions
            .update(chat_id, |s| {
                s.pending = Some(PendingAction::Entry {
                    kind: TransactionKind::Income,
                })
            })
            .await;
        bot.send_message(chat_id, entry_prompt(TransactionKind::Income))
            .await?;
    } else if data == "menu:expense" {
        cfg.sessions
            .update(chat_id, |s| {
                s.pending = Some(PendingAction::Entry {
                    kind: TransactionKind::Expense,
                })
            })
            .await;
        bot.send_message(chat_id, entry_prompt(TransactionKind::Expense))
            .await?;
    } else if data == "menu:transfer" {
        cfg.sessions
            .update(chat_id, |s| s.pending = Some(PendingAction::Transfer))
            .await;
        bot.send_message(chat_id, transfer_usage()).await?;
    } else if data == "menu:wallets" {
        show_wallets(&bot, chat_id, &cfg, user.id).await?;
    } else if data == "menu:assets" {
        show_assets(&bot, chat_id, &cfg, user.id).await?;
    } else if data == "menu:reports" {
        let (text, kb) = ui::render_report_picker();
        edit_or_send(&bot, chat_id, &cfg, text, kb).await?;
    } else if data == "report:daily" {
        show_daily_report(&bot, chat_id, &cfg, user.id).await?;
    } else if data == "report:weekly" {
        show_weekly_report(&bot, chat_id, &cfg, user.id).await?;
    } else if data == "report:monthly" {
        show_monthly_report(&bot, chat_id, &cfg, user.id).await?;
    } else if data == "wallet:add" {
        let (text, kb) = ui::render_wallet_kind_picker();
        bot.send_message(chat_id, text).reply_markup(kb).await?;
    } else if data == "wallet:archive_menu" {
        let wallets = match cfg.users.wallets(user.id).await {
            Ok(w) => w,
            Err(err) => {
                bot.send_message(chat_id, user_message_for_error(&err))
                    .await?;
                return Ok(());
            }
        };
        let (text, kb) =
            ui::render_wallet_picker("Kantong mana yang mau diarsipkan?", &wallets, "wallet:archive");
        edit_or_send(&bot, chat_id, &cfg, text, kb).await?;
    } else if let Some(wallet_id) = data.strip_prefix("wallet:archive:") {
        let Ok(wallet_id) = wallet_id.parse::<i32>() else {
            return Ok(());
        };
        match cfg.users.archive_wallet(user.id, wallet_id).await {
            Ok(()) => {
                bot.send_message(chat_id, "✅ Kantong diarsipkan.").await?;
            }
            Err(err) => {
                bot.send_message(chat_id, user_message_for_error(&err))
                    .await?;
            }
        }
        show_wallets(&bot, chat_id, &cfg, user.id).await?;
    } else if let Some(kind) = data.strip_prefix("wallet:kind:") {
        let Ok(kind) = WalletKind::try_from(kind) else {
            return Ok(());
        };
        cfg.sessions
            .update(chat_id, |s| {
                s.pending = Some(PendingAction::WalletName { kind })
            })
            .await;
        bot.send_message(chat_id, "Nama kantong barunya apa? (mis. BCA, GoPay)")
            .await?;
    } else if let Some(wallet_id) = data.strip_prefix("entry:wallet:") {
        let Ok(wallet_id) = wallet_id.parse::<i32>() else {
            return Ok(());
        };
        let draft = cfg.sessions.get(chat_id).await.entry_draft;
        let Some(mut draft) = draft else {
            show_menu(&bot, chat_id, &cfg, &profile).await?;
            return Ok(());
        };
        draft.wallet_id = Some(wallet_id);
        cfg.sessions
            .update(chat_id, |s| s.entry_draft = Some(draft.clone()))
            .await;
        show_category_picker(&bot, chat_id, &cfg, draft.kind).await?;
    } else if let Some(raw) = data.strip_prefix("entry:cat:") {
        let category_id = match raw {
            "none" => None,
            id => match id.parse::<i32>() {
                Ok(id) => Some(id),
                Err(_) => return Ok(()),
            },
        };
        let draft = cfg
            .sessions
            .update(chat_id, |s| s.pending = None)
            .await
            .entry_draft;
        let Some(draft) = draft else {
            show_menu(&bot, chat_id, &cfg, &profile).await?;
            return Ok(());
        };
        save_entry(&bot, chat_id, &cfg, &user, draft, category_id).await?;
    } else if data == "asset:add" {
        start_asset_flow(&bot, chat_id, &cfg, user.id).await?;
    } else if let Some(wallet_id) = data.strip_prefix("asset:wallet:") {
        let Ok(wallet_id) = wallet_id.parse::<i32>() else {
            return Ok(());
        };
        if let Err(err) = cfg.users.wallet_by_id(user.id, wallet_id).await {
            bot.send_message(chat_id, user_message_for_error(&err))
                .await?;
            return Ok(());
        }
        let (text, kb) = ui::render_asset_kind_picker(wallet_id);
        edit_or_send(&bot, chat_id, &cfg, text, kb).await?;
    } else if let Some(rest) = data.strip_prefix("asset:kind:") {
        let Some((wallet_id, kind)) = rest.split_once(':') else {
            return Ok(());
        };
        let (Ok(wallet_id), Ok(kind)) = (wallet_id.parse::<i32>(), AssetKind::try_from(kind))
        else {
            return Ok(());
        };
        cfg.sessions
            .update(chat_id, |s| {
                s.pending = Some(PendingAction::AssetSymbol { wallet_id, kind })
            })
            .await;
        let prompt = match kind {
            AssetKind::Stock => "Kode sahamnya apa? (mis. BBCA, TLKM)",
            AssetKind::Crypto => "Id CoinGecko-nya apa? (mis. bitcoin, ethereum)",
        };
        bot.send_message(chat_id, prompt).await?;
    } else if let Some(asset_id) = data.strip_prefix("asset:sync:") {
        let Ok(asset_id) = asset_id.parse::<i32>() else {
            return Ok(());
        };
        let holdings = match cfg.assets.list(user.id).await {
            Ok(h) => h,
            Err(err) => {
                bot.send_message(chat_id, user_message_for_error(&err))
                    .await?;
                return Ok(());
            }
        };
        let Some(asset) = holdings.iter().find(|a| a.id == asset_id) else {
            return Ok(());
        };
        match cfg.prices.sync_asset(&cfg.assets, asset).await {
            Ok(true) => {}
            Ok(false) => {
                bot.send_message(
                    chat_id,
                    format!("Harga {} belum bisa diambil, coba lagi nanti.", asset.symbol),
                )
                .await?;
            }
            Err(err) => {
                bot.send_message(chat_id, user_message_for_error(&err))
                    .await?;
                return Ok(());
            }
        }
        show_assets(&bot, chat_id, &cfg, user.id).await?;
    } else if data == "asset:sync" {
        match cfg.prices.sync_user(&cfg.assets, user.id).await {
            Ok(updated) => {
                bot.send_message(chat_id, format!("🔄 {updated} harga diperbarui."))
                    .await?;
            }
            Err(err) => {
                bot.send_message(chat_id, user_message_for_error(&err))
                    .await?;
                return Ok(());
            }
        }
        show_assets(&bot, chat_id, &cfg, user.id).await?;
    } else if data == "asset:edit" {
        let holdings = match cfg.assets.list(user.id).await {
            Ok(h) => h,
            Err(err) => {
                bot.send_message(chat_id, user_message_for_error(&err))
                    .await?;
                return Ok(());
            }
        };
        let (text, kb) = ui::render_asset_edit_picker(&holdings);
        edit_or_send(&bot, chat_id, &cfg, text, kb).await?;
    } else if let Some(asset_id) = data.strip_prefix("asset:editsel:") {
        let Ok(asset_id) = asset_id.parse::<i32>() else {
            return Ok(());
        };
        let holdings = match cfg.assets.list(user.id).await {
            Ok(h) => h,
            Err(err) => {
                bot.send_message(chat_id, user_message_for_error(&err))
                    .await?;
                return Ok(());
            }
        };
        let Some(asset) = holdings.iter().find(|a| a.id == asset_id) else {
            return Ok(());
        };
        let (text, kb) = ui::render_asset_field_picker(asset);
        edit_or_send(&bot, chat_id, &cfg, text, kb).await?;
    } else if let Some(rest) = data.strip_prefix("asset:field:") {
        let Some((asset_id, field)) = rest.split_once(':') else {
            return Ok(());
        };
        let Ok(asset_id) = asset_id.parse::<i32>() else {
            return Ok(());
        };
        let (field, prompt) = match field {
            "quantity" => (
                AssetField::Quantity,
                "Jumlah barunya berapa? (mis. 3 atau 0,5)",
            ),
            "price" => (AssetField::BuyPrice, "Harga beli barunya berapa? (mis. 9.250)"),
            "name" => (AssetField::Name, "Nama barunya apa?"),
            _ => return Ok(()),
        };
        cfg.sessions
            .update(chat_id, |s| {
                s.pending = Some(PendingAction::AssetEdit { asset_id, field })
            })
            .await;
        bot.send_message(chat_id, prompt).await?;
    } else if data == "asset:remove" {
        let holdings = match cfg.assets.list(user.id).await {
            Ok(h) => h,
            Err(err) => {
                bot.send_message(chat_id, user_message_for_error(&err))
                    .await?;
                return Ok(());
            }
        };
        let (text, kb) = ui::render_asset_remove_picker(&holdings);
        edit_or_send(&bot, chat_id, &cfg, text, kb).await?;
    } else if let Some(asset_id) = data.strip_prefix("asset:del:") {
        let Ok(asset_id) = asset_id.parse::<i32>() else {
            return Ok(());
        };
        match cfg.assets.remove(user.id, asset_id).await {
            Ok(()) => {
                bot.send_message(chat_id, "✅ Aset dihapus.").await?;
            }
            Err(err) => {
                bot.send_message(chat_id, user_message_for_error(&err))
                    .await?;
            }
        }
        show_assets(&bot, chat_id, &cfg, user.id).await?;
    }

    Ok(())
}

async fn handle_pending_message(
    bot: &Bot,
    msg: &Message,
    cfg: &ConfigParameters,
    profile: &TelegramProfile,
    pending: PendingAction,
) -> ResponseResult<bool> {
    let chat_id = msg.chat.id;
    let Some(text) = msg.text() else {
        return Ok(true);
    };
    // A command or "batal" aborts the wizard.
    let aborts = text.trim_start().starts_with('/');
    if aborts || text.trim().eq_ignore_ascii_case("batal") {
        cfg.sessions.update(chat_id, Session::clear_flow).await;
        if !aborts {
            bot.send_message(chat_id, "Oke, dibatalkan.").await?;
            return Ok(true);
        }
        return Ok(false);
    }

    let Some(user) = require_user(bot, chat_id, cfg, profile).await? else {
        return Ok(true);
    };

    match pending {
        PendingAction::WalletName { kind } => {
            let name = text.trim().to_string();
            if name.is_empty() {
                bot.send_message(chat_id, "Nama kantong tidak boleh kosong.")
                    .await?;
                return Ok(true);
            }
            cfg.sessions
                .update(chat_id, |s| {
                    s.pending = Some(PendingAction::WalletBalance { name, kind })
                })
                .await;
            bot.send_message(chat_id, "Saldo awalnya berapa? (0 kalau kosong)")
                .await?;
        }
        PendingAction::WalletBalance { name, kind } => {
            let balance = if text.trim() == "0" {
                Money::ZERO
            } else {
                match parsing::parse_amount(text) {
                    Ok(minor) => Money::new(minor),
                    Err(_) => {
                        bot.send_message(chat_id, "Jumlah tidak valid (contoh: 500rb, 1,5jt, 0).")
                            .await?;
                        return Ok(true);
                    }
                }
            };
            cfg.sessions.update(chat_id, |s| s.pending = None).await;
            match cfg
                .users
                .create_wallet(
                    user.id,
                    NewWallet {
                        name: name.clone(),
                        kind,
                        initial_balance: balance,
                        description: None,
                    },
                )
                .await
            {
                Ok(wallet) => {
                    bot.send_message(
                        chat_id,
                        format!(
                            "✅ Kantong {} {} dibuat dengan saldo {}.",
                            kind.emoji(),
                            wallet.name,
                            balance
                        ),
                    )
                    .await?;
                    show_wallets(bot, chat_id, cfg, user.id).await?;
                }
                Err(err) => {
                    bot.send_message(chat_id, user_message_for_error(&err))
                        .await?;
                }
            }
        }
        PendingAction::Entry { kind } => {
            let entry = match parsing::parse_entry(text) {
                Ok(entry) => entry,
                Err(err) => {
                    bot.send_message(chat_id, parse_feedback(&err)).await?;
                    return Ok(true);
                }
            };
            cfg.sessions.update(chat_id, |s| s.pending = None).await;
            start_entry_flow(bot, chat_id, cfg, &user, kind, entry, false).await?;
        }
        PendingAction::Transfer => {
            cfg.sessions.update(chat_id, |s| s.pending = None).await;
            run_transfer(bot, chat_id, cfg, &user, text).await?;
        }
        PendingAction::AssetSymbol { wallet_id, kind } => {
            let symbol = text.trim().to_string();
            if symbol.is_empty() || symbol.contains(' ') {
                bot.send_message(chat_id, "Simbol tidak valid.").await?;
                return Ok(true);
            }
            cfg.sessions
                .update(chat_id, |s| {
                    s.pending = Some(PendingAction::AssetName {
                        wallet_id,
                        kind,
                        symbol,
                    })
                })
                .await;
            bot.send_message(
                chat_id,
                "Nama asetnya apa? (mis. Bank Central Asia, Bitcoin)",
            )
            .await?;
        }
        PendingAction::AssetName {
            wallet_id,
            kind,
            symbol,
        } => {
            let name = text.trim().to_string();
            if name.is_empty() {
                bot.send_message(chat_id, "Nama aset tidak boleh kosong.")
                    .await?;
                return Ok(true);
            }
            cfg.sessions
                .update(chat_id, |s| {
                    s.pending = Some(PendingAction::AssetQuantity {
                        wallet_id,
                        kind,
                        symbol,
                        name,
                    })
                })
                .await;
            let prompt = match kind {
                AssetKind::Stock => "Berapa lot? (1 lot = 100 lembar)",
                AssetKind::Crypto => "Berapa unit? (boleh desimal, mis. 0,5)",
            };
            bot.send_message(chat_id, prompt).await?;
        }
        PendingAction::AssetQuantity {
            wallet_id,
            kind,
            symbol,
            name,
        } => {
            let quantity = match parsing::parse_quantity(text) {
                Ok(quantity) => quantity,
                Err(_) => {
                    bot.send_message(chat_id, "Jumlah tidak valid (mis. 2 atau 0,5).")
                        .await?;
                    return Ok(true);
                }
            };
            cfg.sessions
                .update(chat_id, |s| {
                    s.pending = Some(PendingAction::AssetBuyPrice {
                        wallet_id,
                        kind,
                        symbol,
                        name,
                        quantity,
                    })
                })
                .await;
            bot.send_message(chat_id, "Harga beli per lembar/unit? (mis. 9.250)")
                .await?;
        }
        PendingAction::AssetBuyPrice {
            wallet_id,
            kind,
            symbol,
            name,
            quantity,
        } => {
            let buy_price = match parsing::parse_amount(text) {
                Ok(minor) => Money::new(minor),
                Err(_) => {
                    bot.send_message(chat_id, "Harga tidak valid (mis. 9.250 atau 1,2jt).")
                        .await?;
                    return Ok(true);
                }
            };
            cfg.sessions.update(chat_id, |s| s.pending = None).await;

            match cfg
                .assets
                .add(
                    user.id,
                    NewAsset {
                        wallet_id,
                        kind,
                        symbol,
                        name,
                        quantity,
                        buy_price,
                    },
                )
                .await
            {
                Ok(asset) => {
                    bot.send_message(
                        chat_id,
                        format!("✅ Aset {} tercatat. Harga akan disinkronkan otomatis.", asset.symbol),
                    )
                    .await?;
                    // First sync right away so the list is not empty of prices.
                    let _ = cfg.prices.sync_user(&cfg.assets, user.id).await;
                    show_assets(bot, chat_id, cfg, user.id).await?;
                }
                Err(err) => {
                    bot.send_message(chat_id, user_message_for_error(&err))
                        .await?;
                }
            }
        }
        PendingAction::AssetEdit { asset_id, field } => {
            let update = match field {
                AssetField::Quantity => match parsing::parse_quantity(text) {
                    Ok(quantity) => AssetUpdate::Quantity(quantity),
                    Err(_) => {
                        bot.send_message(chat_id, "Jumlah tidak valid (mis. 3 atau 0,5).")
                            .await?;
                        return Ok(true);
                    }
                },
                AssetField::BuyPrice => match parsing::parse_amount(text) {
                    Ok(minor) => AssetUpdate::BuyPrice(Money::new(minor)),
                    Err(_) => {
                        bot.send_message(chat_id, "Harga tidak valid (mis. 9.250 atau 1,2jt).")
                            .await?;
                        return Ok(true);
                    }
                },
                AssetField::Name => {
                    let name = text.trim().to_string();
                    if name.is_empty() {
                        bot.send_message(chat_id, "Nama aset tidak boleh kosong.")
                            .await?;
                        return Ok(true);
                    }
                    AssetUpdate::Name(name)
                }
            };
            cfg.sessions.update(chat_id, |s| s.pending = None).await;
            match cfg.assets.edit(user.id, asset_id, update).await {
                Ok(asset) => {
                    bot.send_message(chat_id, format!("✅ Posisi {} diperbarui.", asset.symbol))
                        .await?;
                    show_assets(bot, chat_id, cfg, user.id).await?;
                }
                Err(err) => {
                    bot.send_message(chat_id, user_message_for_error(&err))
                        .await?;
                }
            }
        }
    }

    Ok(true)
}

/// `/in` and `/out` with arguments save straight away; without arguments they
/// start the wizard.
async fn quick_entry(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user: &users::Model,
    kind: TransactionKind,
    rest: &str,
) -> ResponseResult<()> {
    if rest.trim().is_empty() {
        cfg.sessions
            .update(chat_id, |s| s.pending = Some(PendingAction::Entry { kind }))
            .await;
        bot.send_message(chat_id, entry_usage(kind)).await?;
        return Ok(());
    }
    let entry = match parsing::parse_entry(rest) {
        Ok(entry) => entry,
        Err(_) => {
            bot.send_message(chat_id, entry_usage(kind)).await?;
            return Ok(());
        }
    };
    start_entry_flow(bot, chat_id, cfg, user, kind, entry, true).await
}

/// Resolves the wallet and either saves directly (quick path, with a
/// best-effort category match on the description) or moves on to the
/// category picker.
async fn start_entry_flow(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user: &users::Model,
    kind: TransactionKind,
    entry: parsing::EntryText,
    quick: bool,
) -> ResponseResult<()> {
    let wallet = match resolve_wallet(bot, chat_id, cfg, user, entry.wallet.as_deref()).await? {
        WalletChoice::Found(wallet) => wallet,
        WalletChoice::AskUser => {
            cfg.sessions
                .update(chat_id, |s| {
                    s.entry_draft = Some(EntryDraft {
                        kind,
                        amount_minor: entry.amount_minor,
                        description: entry.description.clone(),
                        wallet_id: None,
                    })
                })
                .await;
            return Ok(());
        }
        WalletChoice::Abort => return Ok(()),
    };

    let draft = EntryDraft {
        kind,
        amount_minor: entry.amount_minor,
        description: entry.description,
        wallet_id: Some(wallet.id),
    };

    if quick {
        let category_id = match category_for(cfg, kind, draft.description.as_deref()).await {
            Ok(id) => id,
            Err(err) => {
                bot.send_message(chat_id, user_message_for_error(&err))
                    .await?;
                return Ok(());
            }
        };
        save_entry(bot, chat_id, cfg, user, draft, category_id).await
    } else {
        cfg.sessions
            .update(chat_id, |s| s.entry_draft = Some(draft))
            .await;
        show_category_picker(bot, chat_id, cfg, kind).await
    }
}

enum WalletChoice {
    Found(wallets::Model),
    AskUser,
    Abort,
}

async fn resolve_wallet(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user: &users::Model,
    name: Option<&str>,
) -> ResponseResult<WalletChoice> {
    if let Some(name) = name {
        return match cfg.users.wallet_by_name(user.id, name).await {
            Ok(Some(wallet)) => Ok(WalletChoice::Found(wallet)),
            Ok(None) => {
                bot.send_message(chat_id, format!("Kantong \"{name}\" tidak ditemukan."))
                    .await?;
                Ok(WalletChoice::Abort)
            }
            Err(err) => {
                bot.send_message(chat_id, user_message_for_error(&err))
                    .await?;
                Ok(WalletChoice::Abort)
            }
        };
    }

    let wallets = match cfg.users.wallets(user.id).await {
        Ok(w) => w,
        Err(err) => {
            bot.send_message(chat_id, user_message_for_error(&err))
                .await?;
            return Ok(WalletChoice::Abort);
        }
    };
    match wallets.len() {
        0 => {
            bot.send_message(chat_id, "Belum ada kantong. Buat dulu lewat /saldo.")
                .await?;
            Ok(WalletChoice::Abort)
        }
        1 => {
            let mut wallets = wallets;
            Ok(WalletChoice::Found(wallets.remove(0)))
        }
        _ => {
            let (text, kb) = ui::render_wallet_picker("Pakai kantong yang mana?", &wallets, "entry:wallet");
            edit_or_send(bot, chat_id, cfg, text, kb).await?;
            Ok(WalletChoice::AskUser)
        }
    }
}

async fn category_for(
    cfg: &ConfigParameters,
    kind: TransactionKind,
    description: Option<&str>,
) -> Result<Option<i32>, LedgerError> {
    let category_kind = match kind {
        TransactionKind::Income => CategoryKind::Income,
        TransactionKind::Expense => CategoryKind::Expense,
        TransactionKind::Transfer => return Ok(None),
    };
    let Some(description) = description else {
        return Ok(None);
    };
    for word in description.split_whitespace() {
        if let Some(category) = cfg.users.match_category(category_kind, word).await? {
            return Ok(Some(category.id));
        }
    }
    Ok(None)
}

async fn show_category_picker(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    kind: TransactionKind,
) -> ResponseResult<()> {
    let category_kind = match kind {
        TransactionKind::Income => CategoryKind::Income,
        TransactionKind::Expense => CategoryKind::Expense,
        TransactionKind::Transfer => {
            return Ok(());
        }
    };
    let categories = match cfg.users.categories(category_kind).await {
        Ok(c) => c,
        Err(err) => {
            bot.send_message(chat_id, user_message_for_error(&err))
                .await?;
            return Ok(());
        }
    };
    let (text, kb) = ui::render_category_picker(&categories);
    edit_or_send(bot, chat_id, cfg, text, kb).await
}

async fn save_entry(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user: &users::Model,
    draft: EntryDraft,
    category_id: Option<i32>,
) -> ResponseResult<()> {
    let (from_wallet_id, to_wallet_id) = match draft.kind {
        TransactionKind::Income => (None, draft.wallet_id),
        TransactionKind::Expense => (draft.wallet_id, None),
        TransactionKind::Transfer => (draft.wallet_id, None),
    };
    let created = cfg
        .users
        .create_transaction(
            user.id,
            NewTransaction {
                kind: draft.kind,
                amount: Money::new(draft.amount_minor),
                description: draft.description.clone(),
                category_id,
                from_wallet_id,
                to_wallet_id,
                notes: None,
            },
        )
        .await;
    cfg.sessions
        .update(chat_id, |s| s.entry_draft = None)
        .await;

    match created {
        Ok(_) => {
            let label = draft.kind.label();
            bot.send_message(
                chat_id,
                format!(
                    "✅ {label} {} {}berhasil dicatat!",
                    format_amount(draft.amount_minor),
                    draft
                        .description
                        .as_deref()
                        .map(|d| format!("untuk \"{d}\" "))
                        .unwrap_or_default()
                ),
            )
            .await?;
        }
        Err(err) => {
            bot.send_message(chat_id, user_message_for_error(&err))
                .await?;
        }
    }
    Ok(())
}

async fn run_transfer(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user: &users::Model,
    text: &str,
) -> ResponseResult<()> {
    let transfer = match parsing::parse_transfer(text) {
        Ok(transfer) => transfer,
        Err(err) => {
            bot.send_message(chat_id, format!("{}\n\n{}", parse_feedback(&err), transfer_usage()))
                .await?;
            return Ok(());
        }
    };

    let from = match cfg.users.wallet_by_name(user.id, &transfer.from_wallet).await {
        Ok(Some(wallet)) => wallet,
        Ok(None) => {
            bot.send_message(
                chat_id,
                format!("Kantong \"{}\" tidak ditemukan.", transfer.from_wallet),
            )
            .await?;
            return Ok(());
        }
        Err(err) => {
            bot.send_message(chat_id, user_message_for_error(&err))
                .await?;
            return Ok(());
        }
    };
    let to = match cfg.users.wallet_by_name(user.id, &transfer.to_wallet).await {
        Ok(Some(wallet)) => wallet,
        Ok(None) => {
            bot.send_message(
                chat_id,
                format!("Kantong \"{}\" tidak ditemukan.", transfer.to_wallet),
            )
            .await?;
            return Ok(());
        }
        Err(err) => {
            bot.send_message(chat_id, user_message_for_error(&err))
                .await?;
            return Ok(());
        }
    };

    let created = cfg
        .users
        .create_transaction(
            user.id,
            NewTransaction {
                kind: TransactionKind::Transfer,
                amount: Money::new(transfer.amount_minor),
                description: None,
                category_id: None,
                from_wallet_id: Some(from.id),
                to_wallet_id: Some(to.id),
                notes: None,
            },
        )
        .await;

    match created {
        Ok(_) => {
            bot.send_message(
                chat_id,
                format!(
                    "✅ Transfer {} dari {} ke {} berhasil.",
                    format_amount(transfer.amount_minor),
                    from.name,
                    to.name
                ),
            )
            .await?;
        }
        Err(err) => {
            bot.send_message(chat_id, user_message_for_error(&err))
                .await?;
        }
    }
    Ok(())
}

/// The add-asset wizard starts with the wallet the holding belongs to.
async fn start_asset_flow(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user_id: i32,
) -> ResponseResult<()> {
    let wallets = match cfg.users.wallets(user_id).await {
        Ok(w) => w,
        Err(err) => {
            bot.send_message(chat_id, user_message_for_error(&err))
                .await?;
            return Ok(());
        }
    };
    if wallets.is_empty() {
        bot.send_message(chat_id, "Buat kantong dulu lewat /saldo.")
            .await?;
        return Ok(());
    }
    let (text, kb) =
        ui::render_wallet_picker("Aset mau dicatat di kantong mana?", &wallets, "asset:wallet");
    edit_or_send(bot, chat_id, cfg, text, kb).await
}

async fn show_menu(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    profile: &TelegramProfile,
) -> ResponseResult<()> {
    let (text, kb) = ui::render_menu(profile.first_name.as_deref());
    edit_or_send(bot, chat_id, cfg, text, kb).await
}

async fn show_status(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user: &users::Model,
) -> ResponseResult<()> {
    let wallets = match cfg.users.wallets(user.id).await {
        Ok(w) => w,
        Err(err) => {
            bot.send_message(chat_id, user_message_for_error(&err))
                .await?;
            return Ok(());
        }
    };
    let total = match cfg.users.total_balance(user.id).await {
        Ok(t) => t,
        Err(err) => {
            bot.send_message(chat_id, user_message_for_error(&err))
                .await?;
            return Ok(());
        }
    };
    let recent = match cfg.reports.recent_with_categories(user.id, 5).await {
        Ok(r) => r,
        Err(err) => {
            bot.send_message(chat_id, user_message_for_error(&err))
                .await?;
            return Ok(());
        }
    };
    let (text, kb) = ui::render_status(&user.display_name(), &wallets, total, &recent);
    edit_or_send(bot, chat_id, cfg, text, kb).await
}

async fn show_wallets(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user_id: i32,
) -> ResponseResult<()> {
    let wallets = match cfg.users.wallets(user_id).await {
        Ok(w) => w,
        Err(err) => {
            bot.send_message(chat_id, user_message_for_error(&err))
                .await?;
            return Ok(());
        }
    };
    let total = match cfg.users.total_balance(user_id).await {
        Ok(t) => t,
        Err(err) => {
            bot.send_message(chat_id, user_message_for_error(&err))
                .await?;
            return Ok(());
        }
    };
    let (text, kb) = ui::render_wallets(&wallets, total);
    edit_or_send(bot, chat_id, cfg, text, kb).await
}

async fn show_assets(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user_id: i32,
) -> ResponseResult<()> {
    let holdings = match cfg.assets.list(user_id).await {
        Ok(h) => h,
        Err(err) => {
            bot.send_message(chat_id, user_message_for_error(&err))
                .await?;
            return Ok(());
        }
    };
    let summary = match cfg.assets.portfolio_summary(user_id).await {
        Ok(s) => s,
        Err(err) => {
            bot.send_message(chat_id, user_message_for_error(&err))
                .await?;
            return Ok(());
        }
    };
    let (text, kb) = ui::render_assets(&holdings, &summary);
    edit_or_send(bot, chat_id, cfg, text, kb).await
}

async fn show_daily_report(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user_id: i32,
) -> ResponseResult<()> {
    let today = chrono::Utc::now().with_timezone(&cfg.timezone).date_naive();
    match cfg.reports.daily(user_id, today, cfg.timezone).await {
        Ok(report) => {
            bot.send_message(chat_id, ui::render_daily_report(&report))
                .reply_markup(ui::back_keyboard())
                .await?;
        }
        Err(err) => {
            bot.send_message(chat_id, user_message_for_error(&err))
                .await?;
        }
    }
    Ok(())
}

async fn show_weekly_report(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user_id: i32,
) -> ResponseResult<()> {
    let today = chrono::Utc::now().with_timezone(&cfg.timezone).date_naive();
    match cfg.reports.weekly(user_id, today, cfg.timezone).await {
        Ok(report) => {
            bot.send_message(chat_id, ui::render_weekly_report(&report))
                .reply_markup(ui::back_keyboard())
                .await?;
        }
        Err(err) => {
            bot.send_message(chat_id, user_message_for_error(&err))
                .await?;
        }
    }
    Ok(())
}

async fn show_monthly_report(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user_id: i32,
) -> ResponseResult<()> {
    let today = chrono::Utc::now().with_timezone(&cfg.timezone).date_naive();
    match cfg.reports.monthly(user_id, today, cfg.timezone).await {
        Ok(report) => {
            bot.send_message(chat_id, ui::render_monthly_report(&report))
                .reply_markup(ui::back_keyboard())
                .await?;
        }
        Err(err) => {
            bot.send_message(chat_id, user_message_for_error(&err))
                .await?;
        }
    }
    Ok(())
}

async fn export_transactions(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user_id: i32,
) -> ResponseResult<()> {
    #[derive(serde::Serialize)]
    struct ExportRow {
        occurred_at: String,
        kind: String,
        amount: i64,
        description: Option<String>,
        notes: Option<String>,
    }

    // Page through the history instead of loading it in one query.
    const PAGE: u64 = 500;
    let mut writer = csv::Writer::from_writer(vec![]);
    let mut offset = 0;
    let mut exported = 0u64;
    loop {
        let filter = TransactionFilter {
            limit: Some(PAGE),
            offset: Some(offset),
            ..Default::default()
        };
        let rows = match cfg.users.transactions(user_id, &filter).await {
            Ok(rows) => rows,
            Err(err) => {
                bot.send_message(chat_id, user_message_for_error(&err))
                    .await?;
                return Ok(());
            }
        };
        let fetched = rows.len() as u64;
        for tx in rows {
            let row = ExportRow {
                occurred_at: tx.occurred_at.to_rfc3339(),
                kind: tx.kind.clone(),
                amount: tx.amount,
                description: tx.description.clone(),
                notes: tx.notes.clone(),
            };
            if let Err(err) = writer.serialize(row) {
                tracing::error!(%err, "failed to serialize export row");
                bot.send_message(chat_id, "Ekspor gagal, coba lagi nanti.")
                    .await?;
                return Ok(());
            }
        }
        exported += fetched;
        if fetched < PAGE {
            break;
        }
        offset += fetched;
    }
    if exported == 0 {
        bot.send_message(chat_id, "Belum ada transaksi untuk diekspor.")
            .await?;
        return Ok(());
    }
    let data = match writer.into_inner() {
        Ok(data) => data,
        Err(err) => {
            tracing::error!(%err, "failed to finalize export");
            bot.send_message(chat_id, "Ekspor gagal, coba lagi nanti.")
                .await?;
            return Ok(());
        }
    };

    bot.send_document(chat_id, InputFile::memory(data).file_name("transaksi.csv"))
        .await?;
    Ok(())
}

/// Look up (and refresh) the account; nudge towards `/start` if missing.
async fn require_user(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    profile: &TelegramProfile,
) -> ResponseResult<Option<users::Model>> {
    match cfg.users.touch(profile).await {
        Ok(Some(user)) if user.is_active => Ok(Some(user)),
        Ok(_) => {
            bot.send_message(chat_id, "Kamu belum terdaftar. Kirim /start dulu ya.")
                .await?;
            Ok(None)
        }
        Err(err) => {
            bot.send_message(chat_id, user_message_for_error(&err))
                .await?;
            Ok(None)
        }
    }
}

async fn edit_or_send(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    text: String,
    kb: InlineKeyboardMarkup,
) -> ResponseResult<()> {
    let session = cfg.sessions.get(chat_id).await;
    if let Some(message_id) = session.hub_message_id
        && bot
            .edit_message_text(chat_id, message_id, text.clone())
            .reply_markup(kb.clone())
            .await
            .is_ok()
    {
        return Ok(());
    }

    let sent = bot.send_message(chat_id, text).reply_markup(kb).await?;
    cfg.sessions
        .update(chat_id, |s| s.hub_message_id = Some(sent.id))
        .await;
    Ok(())
}

fn is_allowed(cfg: &ConfigParameters, from: Option<&User>) -> bool {
    let Some(from) = from else {
        return false;
    };
    match &cfg.allowed_users {
        None => true,
        Some(ids) => ids.contains(&from.id),
    }
}

fn telegram_profile(from: &User) -> TelegramProfile {
    TelegramProfile {
        telegram_id: from.id.0 as i64,
        username: from.username.clone(),
        first_name: Some(from.first_name.clone()),
        last_name: from.last_name.clone(),
    }
}

fn user_message_for_error(err: &LedgerError) -> String {
    match err {
        LedgerError::KeyNotFound(what) => format!("Tidak ketemu: {what}."),
        LedgerError::ExistingKey(name) => format!("\"{name}\" sudah ada."),
        LedgerError::InvalidAmount(_) => "Jumlah tidak valid.".to_string(),
        LedgerError::InvalidKind(_) => "Input tidak valid.".to_string(),
        LedgerError::Database(_) => {
            tracing::error!(%err, "database error in handler");
            "Lagi ada gangguan, coba lagi sebentar lagi.".to_string()
        }
    }
}

#[derive(Debug, Clone)]
enum Command {
    Start,
    Help,
    Menu,
    Status,
    Saldo,
    In(String),
    Out(String),
    Transfer(String),
    Aset,
    TambahAset,
    Report(String),
    Export,
}

fn parse_command(text: &str) -> Option<Command> {
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return None;
    }
    let mut parts = trimmed.splitn(2, ' ');
    let cmd = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("").to_string();
    // Strip a possible @botname suffix.
    let cmd = cmd.split('@').next().unwrap_or(cmd);

    match cmd {
        "/start" => Some(Command::Start),
        "/help" => Some(Command::Help),
        "/menu" => Some(Command::Menu),
        "/status" | "/info" => Some(Command::Status),
        "/saldo" | "/wallet" => Some(Command::Saldo),
        "/in" | "/income" => Some(Command::In(rest)),
        "/out" | "/expense" => Some(Command::Out(rest)),
        "/transfer" => Some(Command::Transfer(rest)),
        "/aset" | "/asset" => Some(Command::Aset),
        "/tambahaset" => Some(Command::TambahAset),
        "/report" => Some(Command::Report(rest)),
        "/export" => Some(Command::Export),
        _ => None,
    }
}

fn welcome_text(user: &users::Model) -> String {
    format!(
        "Halo {}! 🎉\n\nAkunmu sudah siap dengan kantong \"Tunai\".\n\nContoh pemakaian:\n/in 500rb gaji dari Tunai\n/out 25rb makan siang\n/transfer 100rb BCA Tunai\n\nKetik /menu untuk mulai.",
        user.display_name()
    )
}

fn help_text() -> &'static str {
    "Perintah yang tersedia:\n\n\
     /menu — menu utama\n\
     /status — ringkasan saldo dan transaksi terakhir\n\
     /saldo — daftar kantong\n\
     /in [jumlah] [deskripsi] dari [kantong] — catat pemasukan\n\
     /out [jumlah] [deskripsi] dari [kantong] — catat pengeluaran\n\
     /transfer [jumlah] [dari] [ke] — pindah saldo\n\
     /aset — portofolio saham & kripto\n\
     /tambahaset — tambah aset baru\n\
     /report harian|mingguan|bulanan — laporan\n\
     /export — unduh transaksi (CSV)\n\n\
     Jumlah bisa disingkat: 500rb, 1,5jt, 25k."
}

fn entry_prompt(kind: TransactionKind) -> String {
    format!(
        "Tulis {} dengan format: [jumlah] [deskripsi]\nContoh: 25rb makan siang",
        kind.label().to_lowercase()
    )
}

fn entry_usage(kind: TransactionKind) -> String {
    let (emoji, example) = match kind {
        TransactionKind::Income => ("💰", "/in 500000 gaji dari BCA"),
        TransactionKind::Expense => ("💸", "/out 25000 makan siang dari Tunai"),
        TransactionKind::Transfer => ("🔁", "/transfer 100000 BCA Tunai"),
    };
    format!(
        "{emoji} Catat {}\n\nFormat: [jumlah] [deskripsi] dari [kantong]\nContoh: {example}",
        kind.label()
    )
}

fn transfer_usage() -> &'static str {
    "🔁 Transfer antar kantong\n\nFormat: /transfer [jumlah] [dari] [ke]\nContoh: /transfer 100rb BCA Tunai"
}

fn parse_feedback(err: &ParseError) -> String {
    match err {
        ParseError::InvalidAmount => "Jumlah tidak valid (contoh: 25000, 500rb, 1,5jt).".to_string(),
        ParseError::Incomplete => "Formatnya belum lengkap.".to_string(),
        ParseError::Empty => "Teksnya kosong.".to_string(),
    }
}
