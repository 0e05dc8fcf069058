use chrono::Utc;
use sea_orm::{Database, DatabaseConnection};

use ledger::services::{
    AssetService, AssetUpdate, NewAsset, NewTransaction, NewWallet, RegistrationService,
    ReportService, TelegramProfile, TransactionFilter, UserService,
};
use ledger::{AssetKind, CategoryKind, LedgerError, Money, TransactionKind, WalletKind};
use migration::MigratorTrait;

async fn db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    db
}

fn profile(telegram_id: i64) -> TelegramProfile {
    TelegramProfile {
        telegram_id,
        username: Some("budi".to_string()),
        first_name: Some("Budi".to_string()),
        last_name: None,
    }
}

async fn registered_user(db: &DatabaseConnection, telegram_id: i64) -> ledger::users::Model {
    let (user, created) = RegistrationService::new(db.clone())
        .register(&profile(telegram_id))
        .await
        .unwrap();
    assert!(created);
    user
}

#[tokio::test]
async fn registration_creates_user_and_starter_wallet() {
    let db = db().await;
    let user = registered_user(&db, 1001).await;
    assert_eq!(user.telegram_id, 1001);
    assert_eq!(user.timezone, "Asia/Jakarta");

    let users = UserService::new(db.clone());
    let wallets = users.wallets(user.id).await.unwrap();
    assert_eq!(wallets.len(), 1);
    assert_eq!(wallets[0].name, "Tunai");
    assert_eq!(wallets[0].kind().as_str(), "cash");
    assert_eq!(wallets[0].balance, 0);
}

#[tokio::test]
async fn registration_is_idempotent() {
    let db = db().await;
    registered_user(&db, 1002).await;

    let registration = RegistrationService::new(db.clone());
    let (_, created) = registration.register(&profile(1002)).await.unwrap();
    assert!(!created);
    assert!(registration.is_registered(1002).await.unwrap());
}

#[tokio::test]
async fn deactivate_then_reregister_keeps_one_row() {
    let db = db().await;
    let user = registered_user(&db, 1003).await;

    let registration = RegistrationService::new(db.clone());
    assert!(registration.deactivate(1003).await.unwrap());
    assert!(!registration.is_registered(1003).await.unwrap());

    let (revived, created) = registration.register(&profile(1003)).await.unwrap();
    assert!(!created);
    assert_eq!(revived.id, user.id);
    assert!(registration.is_registered(1003).await.unwrap());
}

#[tokio::test]
async fn duplicate_wallet_name_is_rejected() {
    let db = db().await;
    let user = registered_user(&db, 2001).await;
    let users = UserService::new(db.clone());

    let err = users
        .create_wallet(
            user.id,
            NewWallet {
                name: "Tunai".to_string(),
                kind: WalletKind::Cash,
                initial_balance: Money::ZERO,
                description: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::ExistingKey("Tunai".to_string()));
}

#[tokio::test]
async fn wallet_lookup_prefers_exact_name() {
    let db = db().await;
    let user = registered_user(&db, 2002).await;
    let users = UserService::new(db.clone());

    users
        .create_wallet(
            user.id,
            NewWallet {
                name: "BCA".to_string(),
                kind: WalletKind::Bank,
                initial_balance: Money::new(1_000_000),
                description: None,
            },
        )
        .await
        .unwrap();
    users
        .create_wallet(
            user.id,
            NewWallet {
                name: "BCA Tabungan".to_string(),
                kind: WalletKind::Bank,
                initial_balance: Money::ZERO,
                description: None,
            },
        )
        .await
        .unwrap();

    let found = users.wallet_by_name(user.id, "bca").await.unwrap().unwrap();
    assert_eq!(found.name, "BCA");
    let partial = users
        .wallet_by_name(user.id, "tabungan")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(partial.name, "BCA Tabungan");
}

#[tokio::test]
async fn income_and_expense_move_wallet_balance() {
    let db = db().await;
    let user = registered_user(&db, 3001).await;
    let users = UserService::new(db.clone());
    let wallet = users.wallets(user.id).await.unwrap().remove(0);

    users
        .create_transaction(
            user.id,
            NewTransaction {
                kind: TransactionKind::Income,
                amount: Money::new(5_000_000),
                description: Some("Gaji".to_string()),
                category_id: None,
                from_wallet_id: None,
                to_wallet_id: Some(wallet.id),
                notes: None,
            },
        )
        .await
        .unwrap();
    users
        .create_transaction(
            user.id,
            NewTransaction {
                kind: TransactionKind::Expense,
                amount: Money::new(25_000),
                description: Some("Makan siang".to_string()),
                category_id: None,
                from_wallet_id: Some(wallet.id),
                to_wallet_id: None,
                notes: None,
            },
        )
        .await
        .unwrap();

    let wallet = users.wallet_by_id(user.id, wallet.id).await.unwrap();
    assert_eq!(wallet.balance, 4_975_000);
    assert_eq!(
        users.total_balance(user.id).await.unwrap(),
        Money::new(4_975_000)
    );
}

#[tokio::test]
async fn transfer_moves_between_wallets() {
    let db = db().await;
    let user = registered_user(&db, 3002).await;
    let users = UserService::new(db.clone());
    let cash = users.wallets(user.id).await.unwrap().remove(0);
    let bank = users
        .create_wallet(
            user.id,
            NewWallet {
                name: "BCA".to_string(),
                kind: WalletKind::Bank,
                initial_balance: Money::new(2_000_000),
                description: None,
            },
        )
        .await
        .unwrap();

    users
        .create_transaction(
            user.id,
            NewTransaction {
                kind: TransactionKind::Transfer,
                amount: Money::new(500_000),
                description: Some("Tarik tunai".to_string()),
                category_id: None,
                from_wallet_id: Some(bank.id),
                to_wallet_id: Some(cash.id),
                notes: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(
        users.wallet_by_id(user.id, bank.id).await.unwrap().balance,
        1_500_000
    );
    assert_eq!(
        users.wallet_by_id(user.id, cash.id).await.unwrap().balance,
        500_000
    );
    // Transfers net out to zero.
    assert_eq!(
        users.total_balance(user.id).await.unwrap(),
        Money::new(2_000_000)
    );
}

#[tokio::test]
async fn failed_transfer_rolls_back_the_debit() {
    let db = db().await;
    let user = registered_user(&db, 3005).await;
    let users = UserService::new(db.clone());
    let bank = users
        .create_wallet(
            user.id,
            NewWallet {
                name: "BCA".to_string(),
                kind: WalletKind::Bank,
                initial_balance: Money::new(1_000_000),
                description: None,
            },
        )
        .await
        .unwrap();

    let err = users
        .create_transaction(
            user.id,
            NewTransaction {
                kind: TransactionKind::Transfer,
                amount: Money::new(250_000),
                description: None,
                category_id: None,
                from_wallet_id: Some(bank.id),
                to_wallet_id: Some(9999),
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::KeyNotFound(_)));

    // Nothing was booked and the debit did not stick.
    assert_eq!(
        users.wallet_by_id(user.id, bank.id).await.unwrap().balance,
        1_000_000
    );
    assert!(
        users
            .recent_transactions(user.id, 10)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn transaction_listing_filters_and_pages() {
    let db = db().await;
    let user = registered_user(&db, 3006).await;
    let users = UserService::new(db.clone());
    let wallet = users.wallets(user.id).await.unwrap().remove(0);

    users
        .create_transaction(
            user.id,
            NewTransaction {
                kind: TransactionKind::Income,
                amount: Money::new(1_000_000),
                description: None,
                category_id: None,
                from_wallet_id: None,
                to_wallet_id: Some(wallet.id),
                notes: None,
            },
        )
        .await
        .unwrap();
    for amount in [10_000, 20_000, 30_000] {
        users
            .create_transaction(
                user.id,
                NewTransaction {
                    kind: TransactionKind::Expense,
                    amount: Money::new(amount),
                    description: None,
                    category_id: None,
                    from_wallet_id: Some(wallet.id),
                    to_wallet_id: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
    }

    let expenses = users
        .transactions(
            user.id,
            &TransactionFilter {
                kind: Some(TransactionKind::Expense),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(expenses.len(), 3);
    assert!(expenses.iter().all(|tx| tx.kind == "expense"));

    let page = users
        .transactions(
            user.id,
            &TransactionFilter {
                limit: Some(2),
                offset: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.len(), 2);

    let tomorrow = Utc::now() + chrono::Duration::days(1);
    let future = users
        .transactions(
            user.id,
            &TransactionFilter {
                since: Some(tomorrow),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(future.is_empty());
}

#[tokio::test]
async fn transfer_rejects_same_wallet() {
    let db = db().await;
    let user = registered_user(&db, 3003).await;
    let users = UserService::new(db.clone());
    let wallet = users.wallets(user.id).await.unwrap().remove(0);

    let err = users
        .create_transaction(
            user.id,
            NewTransaction {
                kind: TransactionKind::Transfer,
                amount: Money::new(1000),
                description: None,
                category_id: None,
                from_wallet_id: Some(wallet.id),
                to_wallet_id: Some(wallet.id),
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidKind(_)));
}

#[tokio::test]
async fn zero_amount_is_rejected() {
    let db = db().await;
    let user = registered_user(&db, 3004).await;
    let users = UserService::new(db.clone());
    let wallet = users.wallets(user.id).await.unwrap().remove(0);

    let err = users
        .create_transaction(
            user.id,
            NewTransaction {
                kind: TransactionKind::Expense,
                amount: Money::ZERO,
                description: None,
                category_id: None,
                from_wallet_id: Some(wallet.id),
                to_wallet_id: None,
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(_)));
}

#[tokio::test]
async fn seeded_categories_match_by_name() {
    let db = db().await;
    registered_user(&db, 4001).await;
    let users = UserService::new(db.clone());

    let incomes = users.categories(CategoryKind::Income).await.unwrap();
    assert!(incomes.iter().any(|c| c.name == "Gaji"));
    let expenses = users.categories(CategoryKind::Expense).await.unwrap();
    assert!(expenses.iter().any(|c| c.name == "Makanan"));

    let makan = users
        .match_category(CategoryKind::Expense, "makanan")
        .await
        .unwrap()
        .unwrap();
    assert!(makan.is_system);
}

#[tokio::test]
async fn asset_lifecycle_and_price_sync() {
    let db = db().await;
    let user = registered_user(&db, 5001).await;
    let users = UserService::new(db.clone());
    let wallet = users.wallets(user.id).await.unwrap().remove(0);
    let assets = AssetService::new(db.clone());

    let asset = assets
        .add(
            user.id,
            NewAsset {
                wallet_id: wallet.id,
                kind: AssetKind::Stock,
                symbol: "bbca".to_string(),
                name: "Bank Central Asia".to_string(),
                quantity: 2.0,
                buy_price: Money::new(9_000),
            },
        )
        .await
        .unwrap();
    assert_eq!(asset.symbol, "BBCA");

    let dup = assets
        .add(
            user.id,
            NewAsset {
                wallet_id: wallet.id,
                kind: AssetKind::Stock,
                symbol: "BBCA".to_string(),
                name: "Bank Central Asia".to_string(),
                quantity: 1.0,
                buy_price: Money::new(9_000),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(dup, LedgerError::ExistingKey("BBCA".to_string()));

    assets
        .apply_price(asset.id, Money::new(9_900), Utc::now())
        .await
        .unwrap();
    let synced = assets.by_symbol(user.id, "BBCA").await.unwrap().unwrap();
    assert_eq!(synced.last_price, 9_900);
    assert!(synced.last_sync.is_some());
    // Two lots of 100 shares, up 900 each.
    assert_eq!(synced.return_value(), 180_000);

    let summary = assets.portfolio_summary(user.id).await.unwrap();
    assert_eq!(summary.total_value, Money::new(1_980_000));
    assert_eq!(summary.total_return, Money::new(180_000));

    assets.remove(user.id, asset.id).await.unwrap();
    assert!(assets.list(user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn monthly_report_breaks_down_categories() {
    let db = db().await;
    let user = registered_user(&db, 6001).await;
    let users = UserService::new(db.clone());
    let wallet = users.wallets(user.id).await.unwrap().remove(0);

    let makanan = users
        .match_category(CategoryKind::Expense, "Makanan")
        .await
        .unwrap()
        .unwrap();
    let transport = users
        .match_category(CategoryKind::Expense, "Transportasi")
        .await
        .unwrap()
        .unwrap();

    users
        .create_transaction(
            user.id,
            NewTransaction {
                kind: TransactionKind::Income,
                amount: Money::new(10_000_000),
                description: None,
                category_id: None,
                from_wallet_id: None,
                to_wallet_id: Some(wallet.id),
                notes: None,
            },
        )
        .await
        .unwrap();
    for (category, amount) in [(&makanan, 150_000), (&makanan, 50_000), (&transport, 30_000)] {
        users
            .create_transaction(
                user.id,
                NewTransaction {
                    kind: TransactionKind::Expense,
                    amount: Money::new(amount),
                    description: None,
                    category_id: Some(category.id),
                    from_wallet_id: Some(wallet.id),
                    to_wallet_id: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
    }

    let tz = chrono_tz::Asia::Jakarta;
    let today = Utc::now().with_timezone(&tz).date_naive();
    let reports = ReportService::new(db.clone());

    let monthly = reports.monthly(user.id, today, tz).await.unwrap();
    assert_eq!(monthly.income, Money::new(10_000_000));
    assert_eq!(monthly.expense, Money::new(230_000));
    assert_eq!(monthly.net(), Money::new(9_770_000));
    assert_eq!(monthly.expense_change_percent, None);
    assert_eq!(monthly.top_categories.len(), 2);
    assert_eq!(monthly.top_categories[0].name, "Makanan");
    assert_eq!(monthly.top_categories[0].total, Money::new(200_000));

    let daily = reports.daily(user.id, today, tz).await.unwrap();
    assert_eq!(daily.transaction_count, 4);
    assert_eq!(daily.expense, Money::new(230_000));

    let weekly = reports.weekly(user.id, today, tz).await.unwrap();
    assert_eq!(weekly.expense, Money::new(230_000));
    assert_eq!(weekly.expense_change_percent, None);
}

#[tokio::test]
async fn wallet_breakdown_shares_sum_from_positive_total() {
    let db = db().await;
    let user = registered_user(&db, 6002).await;
    let users = UserService::new(db.clone());
    users
        .create_wallet(
            user.id,
            NewWallet {
                name: "BCA".to_string(),
                kind: WalletKind::Bank,
                initial_balance: Money::new(750_000),
                description: None,
            },
        )
        .await
        .unwrap();
    users
        .create_wallet(
            user.id,
            NewWallet {
                name: "GoPay".to_string(),
                kind: WalletKind::EWallet,
                initial_balance: Money::new(250_000),
                description: None,
            },
        )
        .await
        .unwrap();

    let reports = ReportService::new(db.clone());
    let breakdown = reports.wallet_breakdown(user.id).await.unwrap();
    assert_eq!(breakdown.len(), 3);
    assert_eq!(breakdown[0].wallet.name, "BCA");
    assert_eq!(breakdown[0].share_percent, 75);
    assert_eq!(breakdown[1].share_percent, 25);
    assert_eq!(breakdown[2].share_percent, 0);
}

#[tokio::test]
async fn reports_are_scoped_to_the_user() {
    let db = db().await;
    let budi = registered_user(&db, 7001).await;
    let sari = registered_user(&db, 7002).await;
    let users = UserService::new(db.clone());
    let budi_wallet = users.wallets(budi.id).await.unwrap().remove(0);

    users
        .create_transaction(
            budi.id,
            NewTransaction {
                kind: TransactionKind::Expense,
                amount: Money::new(80_000),
                description: None,
                category_id: None,
                from_wallet_id: Some(budi_wallet.id),
                to_wallet_id: None,
                notes: None,
            },
        )
        .await
        .unwrap();

    let tz = chrono_tz::Asia::Jakarta;
    let today = Utc::now().with_timezone(&tz).date_naive();
    let reports = ReportService::new(db.clone());

    let theirs = reports.daily(sari.id, today, tz).await.unwrap();
    assert_eq!(theirs.expense, Money::ZERO);
    assert_eq!(theirs.transaction_count, 0);

    let ours = reports.daily(budi.id, today, tz).await.unwrap();
    assert_eq!(ours.expense, Money::new(80_000));
}

#[tokio::test]
async fn spending_trend_covers_the_requested_months() {
    let db = db().await;
    let user = registered_user(&db, 6003).await;
    let users = UserService::new(db.clone());
    let wallet = users.wallets(user.id).await.unwrap().remove(0);

    users
        .create_transaction(
            user.id,
            NewTransaction {
                kind: TransactionKind::Expense,
                amount: Money::new(120_000),
                description: None,
                category_id: None,
                from_wallet_id: Some(wallet.id),
                to_wallet_id: None,
                notes: None,
            },
        )
        .await
        .unwrap();

    let tz = chrono_tz::Asia::Jakarta;
    let today = Utc::now().with_timezone(&tz).date_naive();
    let reports = ReportService::new(db.clone());

    let trend = reports.spending_trend(user.id, today, 3, tz).await.unwrap();
    assert_eq!(trend.len(), 3);
    // Oldest first; only the current month has spending.
    assert_eq!(trend[0].expense, Money::ZERO);
    assert_eq!(trend[1].expense, Money::ZERO);
    assert_eq!(trend[2].expense, Money::new(120_000));
    assert!(trend[0].month_start < trend[2].month_start);
}

#[tokio::test]
async fn position_updates_and_kind_filters() {
    let db = db().await;
    let user = registered_user(&db, 6004).await;
    let users = UserService::new(db.clone());
    let wallet = users.wallets(user.id).await.unwrap().remove(0);
    let assets = AssetService::new(db.clone());

    let stock = assets
        .add(
            user.id,
            NewAsset {
                wallet_id: wallet.id,
                kind: AssetKind::Stock,
                symbol: "TLKM".to_string(),
                name: "Telkom Indonesia".to_string(),
                quantity: 1.0,
                buy_price: Money::new(3_000),
            },
        )
        .await
        .unwrap();
    assets
        .add(
            user.id,
            NewAsset {
                wallet_id: wallet.id,
                kind: AssetKind::Crypto,
                symbol: "bitcoin".to_string(),
                name: "Bitcoin".to_string(),
                quantity: 0.5,
                buy_price: Money::new(1_500_000_000),
            },
        )
        .await
        .unwrap();

    let stocks = assets.list_by_kind(user.id, AssetKind::Stock).await.unwrap();
    assert_eq!(stocks.len(), 1);
    assert_eq!(stocks[0].symbol, "TLKM");

    // Averaged down after buying more lots; each field edits on its own.
    let updated = assets
        .edit(user.id, stock.id, AssetUpdate::Quantity(3.0))
        .await
        .unwrap();
    assert_eq!(updated.quantity, 3.0);
    let updated = assets
        .edit(user.id, stock.id, AssetUpdate::BuyPrice(Money::new(2_800)))
        .await
        .unwrap();
    assert_eq!(updated.quantity, 3.0);
    assert_eq!(updated.buy_price, 2_800);
    let renamed = assets
        .edit(
            user.id,
            stock.id,
            AssetUpdate::Name("Telkom".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Telkom");

    let rejected = assets
        .edit(user.id, stock.id, AssetUpdate::Quantity(0.0))
        .await
        .unwrap_err();
    assert!(matches!(rejected, LedgerError::InvalidAmount(_)));
}
