use std::{collections::HashMap, sync::Arc};

use ledger::{AssetKind, TransactionKind, WalletKind};
use teloxide::types::{ChatId, MessageId};
use tokio::sync::Mutex;

/// Transaction being assembled across the wizard steps.
#[derive(Clone, Debug)]
pub(crate) struct EntryDraft {
    pub kind: TransactionKind,
    pub amount_minor: i64,
    pub description: Option<String>,
    pub wallet_id: Option<i32>,
}

/// Which field of a holding the edit flow is changing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AssetField {
    Quantity,
    BuyPrice,
    Name,
}

/// What the next plain-text message in this chat is for.
#[derive(Clone, Debug)]
pub(crate) enum PendingAction {
    WalletName {
        kind: WalletKind,
    },
    WalletBalance {
        name: String,
        kind: WalletKind,
    },
    Entry {
        kind: TransactionKind,
    },
    Transfer,
    AssetSymbol {
        wallet_id: i32,
        kind: AssetKind,
    },
    AssetName {
        wallet_id: i32,
        kind: AssetKind,
        symbol: String,
    },
    AssetQuantity {
        wallet_id: i32,
        kind: AssetKind,
        symbol: String,
        name: String,
    },
    AssetBuyPrice {
        wallet_id: i32,
        kind: AssetKind,
        symbol: String,
        name: String,
        quantity: f64,
    },
    AssetEdit {
        asset_id: i32,
        field: AssetField,
    },
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Session {
    pub hub_message_id: Option<MessageId>,
    pub pending: Option<PendingAction>,
    pub entry_draft: Option<EntryDraft>,
}

impl Session {
    /// Drop whatever wizard was in flight. The hub message stays so menu
    /// navigation keeps editing in place.
    pub(crate) fn clear_flow(&mut self) {
        self.pending = None;
        self.entry_draft = None;
    }
}

#[derive(Clone, Default)]
pub(crate) struct SessionStore {
    inner: Arc<Mutex<HashMap<ChatId, Session>>>,
}

impl SessionStore {
    pub(crate) async fn get(&self, chat_id: ChatId) -> Session {
        let guard = self.inner.lock().await;
        guard.get(&chat_id).cloned().unwrap_or_default()
    }

    pub(crate) async fn update<F>(&self, chat_id: ChatId, f: F) -> Session
    where
        F: FnOnce(&mut Session),
    {
        let mut guard = self.inner.lock().await;
        let session = guard.entry(chat_id).or_insert_with(Session::default);
        f(session);
        session.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wallet_wizard_steps_kind_then_name_then_balance() {
        let sessions = SessionStore::default();
        let chat = ChatId(10);

        sessions
            .update(chat, |s| {
                s.pending = Some(PendingAction::WalletName {
                    kind: WalletKind::Bank,
                })
            })
            .await;
        assert!(matches!(
            sessions.get(chat).await.pending,
            Some(PendingAction::WalletName {
                kind: WalletKind::Bank
            })
        ));

        let after_name = sessions
            .update(chat, |s| {
                s.pending = Some(PendingAction::WalletBalance {
                    name: "BCA".to_string(),
                    kind: WalletKind::Bank,
                })
            })
            .await;
        assert!(matches!(
            after_name.pending,
            Some(PendingAction::WalletBalance { .. })
        ));

        let done = sessions.update(chat, |s| s.pending = None).await;
        assert!(done.pending.is_none());
    }

    #[tokio::test]
    async fn cancelling_clears_the_wizard_but_keeps_the_hub_message() {
        let sessions = SessionStore::default();
        let chat = ChatId(11);

        sessions
            .update(chat, |s| {
                s.hub_message_id = Some(MessageId(42));
                s.pending = Some(PendingAction::Entry {
                    kind: TransactionKind::Income,
                });
                s.entry_draft = Some(EntryDraft {
                    kind: TransactionKind::Income,
                    amount_minor: 500_000,
                    description: Some("Gaji".to_string()),
                    wallet_id: None,
                });
            })
            .await;

        let cleared = sessions.update(chat, Session::clear_flow).await;
        assert!(cleared.pending.is_none());
        assert!(cleared.entry_draft.is_none());
        assert_eq!(cleared.hub_message_id, Some(MessageId(42)));
    }

    #[tokio::test]
    async fn sessions_are_scoped_per_chat() {
        let sessions = SessionStore::default();
        sessions
            .update(ChatId(1), |s| s.pending = Some(PendingAction::Transfer))
            .await;
        assert!(sessions.get(ChatId(2)).await.pending.is_none());
        assert!(matches!(
            sessions.get(ChatId(1)).await.pending,
            Some(PendingAction::Transfer)
        ));
    }
}
