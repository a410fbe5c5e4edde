use {
    crate::models::{Entity, ModelError},
    chrono::{DateTime, NaiveDateTime, Utc},
    serde::{Deserialize, Deserializer, Serialize, de::Error as _},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Entry,
    Exit,
}

/// Discriminant of [`TransactionDetails`], as written in the `kind` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Pix,
    Ted,
    Billet,
}

impl TransactionKind {
    fn name(self) -> &'static str {
        match self {
            TransactionKind::Pix => "pix",
            TransactionKind::Ted => "ted",
            TransactionKind::Billet => "billet",
        }
    }
}

/// Variant-specific payload of a transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionDetails {
    Pix { key: String },
    Ted { sent_by: String, received_by: String },
    Billet { code: String },
}

#[derive(Debug, Clone, Default)]
struct VariantFields {
    key: Option<String>,
    sent_by: Option<String>,
    received_by: Option<String>,
    code: Option<String>,
}

/// Forms post every variant field at once and leave the unused ones as `""`,
/// so an empty string never counts as a populated field.
fn present(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|value| !value.is_empty())
}

impl VariantFields {
    fn overlay(&mut self, other: VariantFields) {
        if present(&other.key) {
            self.key = other.key;
        }
        if present(&other.sent_by) {
            self.sent_by = other.sent_by;
        }
        if present(&other.received_by) {
            self.received_by = other.received_by;
        }
        if present(&other.code) {
            self.code = other.code;
        }
    }

    fn infer_kind(&self) -> Result<TransactionKind, ModelError> {
        let pix = present(&self.key);
        let ted = present(&self.sent_by) || present(&self.received_by);
        let billet = present(&self.code);

        match (pix, ted, billet) {
            (true, false, false) => Ok(TransactionKind::Pix),
            (false, true, false) => Ok(TransactionKind::Ted),
            (false, false, true) => Ok(TransactionKind::Billet),
            (false, false, false) => Err(ModelError::AmbiguousVariant(
                "no pix, ted or billet fields present",
            )),
            _ => Err(ModelError::AmbiguousVariant(
                "fields of more than one transaction variant present",
            )),
        }
    }
}

fn reject(
    field: &Option<String>,
    name: &'static str,
    kind: TransactionKind,
) -> Result<(), ModelError> {
    if present(field) {
        return Err(ModelError::ConflictingVariant(name, kind.name()));
    }
    Ok(())
}

fn require(
    field: Option<String>,
    name: &'static str,
    kind: TransactionKind,
) -> Result<String, ModelError> {
    field.ok_or(ModelError::MissingVariantField(name, kind.name()))
}

/// Reads RFC 3339 as well as the zone-less `YYYY-MM-DDTHH:MM[:SS]` sent by
/// `datetime-local` inputs, taken as UTC. An empty string means no timestamp.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_timestamp(&raw).map_err(D::Error::custom),
        None => Ok(None),
    }
}

fn parse_timestamp(raw: &str) -> Result<Option<DateTime<Utc>>, String> {
    if raw.is_empty() {
        return Ok(None);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| Some(naive.and_utc()))
        .ok_or_else(|| format!("invalid created_at timestamp: {raw}"))
}

impl TransactionDetails {
    pub fn kind(&self) -> TransactionKind {
        match self {
            TransactionDetails::Pix { .. } => TransactionKind::Pix,
            TransactionDetails::Ted { .. } => TransactionKind::Ted,
            TransactionDetails::Billet { .. } => TransactionKind::Billet,
        }
    }

    fn fields(&self) -> VariantFields {
        match self.clone() {
            TransactionDetails::Pix { key } => VariantFields {
                key: Some(key),
                ..Default::default()
            },
            TransactionDetails::Ted {
                sent_by,
                received_by,
            } => VariantFields {
                sent_by: Some(sent_by),
                received_by: Some(received_by),
                ..Default::default()
            },
            TransactionDetails::Billet { code } => VariantFields {
                code: Some(code),
                ..Default::default()
            },
        }
    }

    /// Builds the payload from loose fields. Without an explicit `kind` the
    /// variant is inferred from which group of fields is non-empty; exactly
    /// one group must be. Once the variant is known its own fields are kept
    /// as given, even when empty.
    fn resolve(kind: Option<TransactionKind>, fields: VariantFields) -> Result<Self, ModelError> {
        let kind = match kind {
            Some(kind) => kind,
            None => fields.infer_kind()?,
        };

        match kind {
            TransactionKind::Pix => {
                reject(&fields.sent_by, "sent_by", kind)?;
                reject(&fields.received_by, "received_by", kind)?;
                reject(&fields.code, "code", kind)?;
                Ok(TransactionDetails::Pix {
                    key: require(fields.key, "key", kind)?,
                })
            }
            TransactionKind::Ted => {
                reject(&fields.key, "key", kind)?;
                reject(&fields.code, "code", kind)?;
                Ok(TransactionDetails::Ted {
                    sent_by: require(fields.sent_by, "sent_by", kind)?,
                    received_by: require(fields.received_by, "received_by", kind)?,
                })
            }
            TransactionKind::Billet => {
                reject(&fields.key, "key", kind)?;
                reject(&fields.sent_by, "sent_by", kind)?;
                reject(&fields.received_by, "received_by", kind)?;
                Ok(TransactionDetails::Billet {
                    code: require(fields.code, "code", kind)?,
                })
            }
        }
    }

    fn merged(
        &self,
        kind: Option<TransactionKind>,
        patch: VariantFields,
    ) -> Result<Self, ModelError> {
        let current = self.kind();
        let target = kind.unwrap_or(current);

        // Switching variant drops the old payload entirely.
        let mut fields = if target == current {
            self.fields()
        } else {
            VariantFields::default()
        };
        fields.overlay(patch);

        Self::resolve(Some(target), fields)
    }
}

/// A movement on a user's ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTransaction", into = "RawTransaction")]
pub struct Transaction {
    pub id: Option<u64>,
    pub value: f64,
    pub user_id: u64,
    pub transaction_type: TransactionType,
    pub bank: String,
    pub details: TransactionDetails,
    pub created_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn new(
        value: f64,
        user_id: u64,
        transaction_type: TransactionType,
        bank: impl Into<String>,
        details: TransactionDetails,
    ) -> Result<Self, ModelError> {
        if !value.is_finite() {
            return Err(ModelError::NonFiniteValue);
        }

        Ok(Transaction {
            id: None,
            value,
            user_id,
            transaction_type,
            bank: bank.into(),
            details,
            created_at: None,
        })
    }

    pub fn kind(&self) -> TransactionKind {
        self.details.kind()
    }

    /// Contribution of this transaction to its owner's balance.
    pub fn signed_value(&self) -> f64 {
        match self.transaction_type {
            TransactionType::Entry => self.value,
            TransactionType::Exit => -self.value,
        }
    }
}

/// Partial update merged onto an existing transaction. `id` is not patchable.
/// Empty variant fields leave the stored ones untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionPatch {
    pub value: Option<f64>,
    pub user_id: Option<u64>,
    pub transaction_type: Option<TransactionType>,
    pub bank: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    pub kind: Option<TransactionKind>,
    /// Form name of the discriminant, used when `kind` is absent.
    pub transaction_method: Option<TransactionKind>,
    pub key: Option<String>,
    pub sent_by: Option<String>,
    pub received_by: Option<String>,
    pub code: Option<String>,
}

impl Entity for Transaction {
    type Patch = TransactionPatch;

    const COLLECTION: &'static str = "transactions";

    fn id(&self) -> Option<u64> {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = Some(id);
    }

    fn apply(&mut self, patch: TransactionPatch) -> Result<(), ModelError> {
        if patch.value.is_some_and(|value| !value.is_finite()) {
            return Err(ModelError::NonFiniteValue);
        }

        let details = self.details.merged(
            patch.kind.or(patch.transaction_method),
            VariantFields {
                key: patch.key,
                sent_by: patch.sent_by,
                received_by: patch.received_by,
                code: patch.code,
            },
        )?;

        if let Some(value) = patch.value {
            self.value = value;
        }
        if let Some(user_id) = patch.user_id {
            self.user_id = user_id;
        }
        if let Some(transaction_type) = patch.transaction_type {
            self.transaction_type = transaction_type;
        }
        if let Some(bank) = patch.bank {
            self.bank = bank;
        }
        if let Some(created_at) = patch.created_at {
            self.created_at = Some(created_at);
        }
        self.details = details;

        Ok(())
    }
}

/// Flat on-disk shape. `kind` is optional so that records written before the
/// discriminant existed still load; those may name it `transaction_method`.
#[derive(Serialize, Deserialize)]
struct RawTransaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    value: f64,
    user_id: u64,
    transaction_type: TransactionType,
    bank: String,
    #[serde(
        default,
        deserialize_with = "deserialize_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kind: Option<TransactionKind>,
    #[serde(default, skip_serializing)]
    transaction_method: Option<TransactionKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sent_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    received_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl TryFrom<RawTransaction> for Transaction {
    type Error = ModelError;

    fn try_from(raw: RawTransaction) -> Result<Self, Self::Error> {
        let details = TransactionDetails::resolve(
            raw.kind.or(raw.transaction_method),
            VariantFields {
                key: raw.key,
                sent_by: raw.sent_by,
                received_by: raw.received_by,
                code: raw.code,
            },
        )?;

        let mut transaction = Transaction::new(
            raw.value,
            raw.user_id,
            raw.transaction_type,
            raw.bank,
            details,
        )?;
        transaction.id = raw.id;
        transaction.created_at = raw.created_at;

        Ok(transaction)
    }
}

impl From<Transaction> for RawTransaction {
    fn from(transaction: Transaction) -> Self {
        let kind = transaction.kind();
        let fields = transaction.details.fields();

        RawTransaction {
            id: transaction.id,
            value: transaction.value,
            user_id: transaction.user_id,
            transaction_type: transaction.transaction_type,
            bank: transaction.bank,
            created_at: transaction.created_at,
            kind: Some(kind),
            transaction_method: None,
            key: fields.key,
            sent_by: fields.sent_by,
            received_by: fields.received_by,
            code: fields.code,
        }
    }
}
