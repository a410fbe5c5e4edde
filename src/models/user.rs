use {
    crate::models::{Entity, ModelError},
    serde::{Deserialize, Serialize},
};

/// Discriminant of [`UserKind`], as written in the `kind` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserKindTag {
    Natural,
    Legal,
}

impl UserKindTag {
    fn name(self) -> &'static str {
        match self {
            UserKindTag::Natural => "natural",
            UserKindTag::Legal => "legal",
        }
    }
}

fn present(document: &Option<String>) -> bool {
    document.as_deref().is_some_and(|value| !value.is_empty())
}

/// Natural persons are identified by CPF, legal entities by CNPJ.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum UserKind {
    Natural { cpf: String },
    Legal { cnpj: String },
}

impl UserKind {
    pub fn tag(&self) -> UserKindTag {
        match self {
            UserKind::Natural { .. } => UserKindTag::Natural,
            UserKind::Legal { .. } => UserKindTag::Legal,
        }
    }

    fn documents(&self) -> (Option<String>, Option<String>) {
        match self {
            UserKind::Natural { cpf } => (Some(cpf.clone()), None),
            UserKind::Legal { cnpj } => (None, Some(cnpj.clone())),
        }
    }

    /// An empty document counts as absent when inferring the kind or checking
    /// for the other kind's document.
    fn resolve(
        tag: Option<UserKindTag>,
        cpf: Option<String>,
        cnpj: Option<String>,
    ) -> Result<Self, ModelError> {
        let tag = match (tag, present(&cpf), present(&cnpj)) {
            (Some(tag), _, _) => tag,
            (None, true, false) => UserKindTag::Natural,
            (None, false, true) => UserKindTag::Legal,
            (None, false, false) => {
                return Err(ModelError::AmbiguousVariant("neither cpf nor cnpj present"));
            }
            (None, true, true) => {
                return Err(ModelError::AmbiguousVariant("both cpf and cnpj present"));
            }
        };

        match tag {
            UserKindTag::Natural => {
                if present(&cnpj) {
                    return Err(ModelError::ConflictingVariant("cnpj", tag.name()));
                }
                let cpf = cpf.ok_or(ModelError::MissingVariantField("cpf", tag.name()))?;
                Ok(UserKind::Natural { cpf })
            }
            UserKindTag::Legal => {
                if present(&cpf) {
                    return Err(ModelError::ConflictingVariant("cpf", tag.name()));
                }
                let cnpj = cnpj.ok_or(ModelError::MissingVariantField("cnpj", tag.name()))?;
                Ok(UserKind::Legal { cnpj })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawUser", into = "RawUser")]
pub struct User {
    pub id: Option<u64>,
    pub name: String,
    pub email: String,
    // Stored and compared as plaintext.
    pub password: String,
    pub profile_image: String,
    pub kind: UserKind,
}

impl User {
    pub fn natural(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        cpf: impl Into<String>,
        profile_image: impl Into<String>,
    ) -> Self {
        User {
            id: None,
            name: name.into(),
            email: email.into(),
            password: password.into(),
            profile_image: profile_image.into(),
            kind: UserKind::Natural { cpf: cpf.into() },
        }
    }

    pub fn legal(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        cnpj: impl Into<String>,
        profile_image: impl Into<String>,
    ) -> Self {
        User {
            id: None,
            name: name.into(),
            email: email.into(),
            password: password.into(),
            profile_image: profile_image.into(),
            kind: UserKind::Legal { cnpj: cnpj.into() },
        }
    }
}

/// A user together with the signed sum of their transactions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserWithBalance {
    #[serde(flatten)]
    pub user: User,
    pub balance: f64,
}

/// Partial update merged onto an existing user. `id` is not patchable.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub profile_image: Option<String>,
    pub kind: Option<UserKindTag>,
    pub cpf: Option<String>,
    pub cnpj: Option<String>,
}

impl Entity for User {
    type Patch = UserPatch;

    const COLLECTION: &'static str = "users";

    fn id(&self) -> Option<u64> {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = Some(id);
    }

    fn apply(&mut self, patch: UserPatch) -> Result<(), ModelError> {
        let current = self.kind.tag();
        let target = patch.kind.unwrap_or(current);

        let (mut cpf, mut cnpj) = if target == current {
            self.kind.documents()
        } else {
            (None, None)
        };
        if present(&patch.cpf) {
            cpf = patch.cpf;
        }
        if present(&patch.cnpj) {
            cnpj = patch.cnpj;
        }
        let kind = UserKind::resolve(Some(target), cpf, cnpj)?;

        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(email) = patch.email {
            self.email = email;
        }
        if let Some(password) = patch.password {
            self.password = password;
        }
        if let Some(profile_image) = patch.profile_image {
            self.profile_image = profile_image;
        }
        self.kind = kind;

        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    name: String,
    email: String,
    password: String,
    #[serde(default)]
    profile_image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kind: Option<UserKindTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cpf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cnpj: Option<String>,
}

impl TryFrom<RawUser> for User {
    type Error = ModelError;

    fn try_from(raw: RawUser) -> Result<Self, Self::Error> {
        Ok(User {
            kind: UserKind::resolve(raw.kind, raw.cpf, raw.cnpj)?,
            id: raw.id,
            name: raw.name,
            email: raw.email,
            password: raw.password,
            profile_image: raw.profile_image,
        })
    }
}

impl From<User> for RawUser {
    fn from(user: User) -> Self {
        let (cpf, cnpj) = user.kind.documents();

        RawUser {
            id: user.id,
            name: user.name,
            email: user.email,
            password: user.password,
            profile_image: user.profile_image,
            kind: Some(user.kind.tag()),
            cpf,
            cnpj,
        }
    }
}
