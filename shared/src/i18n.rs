//! Translation tables for API messages.
//!
//! Errors carry a [`MessageKey`]; [`localize_messages`] rewrites the body
//! in the language requested through `Accept-Language`.

use axum::{
    extract::Request,
    http::{
        header::{ACCEPT_LANGUAGE, CONTENT_LANGUAGE, CONTENT_LENGTH},
        HeaderValue,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Fr,
    En,
    Ar,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::Fr => "fr",
            Language::En => "en",
            Language::Ar => "ar",
        }
    }

    /// Unknown locales fall back to French.
    pub fn from_locale(locale: &str) -> Self {
        match locale.trim().to_ascii_lowercase().as_str() {
            "en" => Language::En,
            "ar" => Language::Ar,
            _ => Language::Fr,
        }
    }

    /// Uses the primary subtag of the first listed language range,
    /// e.g. `en-GB,en;q=0.9` selects English.
    pub fn from_accept_language(header: &str) -> Self {
        let first = header.split(',').next().unwrap_or_default();
        let range = first.split(';').next().unwrap_or_default();
        let primary = range.split('-').next().unwrap_or_default();
        Self::from_locale(primary)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKey {
    MissingParameters,
    InvalidRequestBody,
    InvalidEmail,
    InvalidRole,
    InvalidExpiry,
    InvalidResourceOrAction,
    InvitationNotFound,
    InvitationInvalidOrExpired,
    InvitationEmailMismatch,
    InvitationAlreadyPending,
    RevokeTargetRequired,
    AccountCreationFailed,
    ProfileCreationFailed,
    OrganizationCreationFailed,
    InvitationCreationFailed,
    InvitationUpdateFailed,
    RevocationFailed,
    InvalidCredentials,
    Unauthenticated,
    Forbidden,
    UserNotFound,
    ResourceNotFound,
    Conflict,
    InternalError,
}

impl MessageKey {
    pub fn translate(self, language: Language) -> &'static str {
        use Language::*;
        use MessageKey::*;
        match (self, language) {
            (MissingParameters, Fr) => "Paramètres manquants",
            (MissingParameters, En) => "Missing parameters",
            (MissingParameters, Ar) => "معلمات مفقودة",

            (InvalidRequestBody, Fr) => "Corps de requête invalide",
            (InvalidRequestBody, En) => "Invalid request body",
            (InvalidRequestBody, Ar) => "نص الطلب غير صالح",

            (InvalidEmail, Fr) => "Adresse email invalide",
            (InvalidEmail, En) => "Invalid email address",
            (InvalidEmail, Ar) => "عنوان بريد إلكتروني غير صالح",

            (InvalidRole, Fr) => "Rôle invalide",
            (InvalidRole, En) => "Invalid role",
            (InvalidRole, Ar) => "دور غير صالح",

            (InvalidExpiry, Fr) => "Durée de validité invalide",
            (InvalidExpiry, En) => "Invalid expiry duration",
            (InvalidExpiry, Ar) => "مدة صلاحية غير صالحة",

            (InvalidResourceOrAction, Fr) => "Ressource ou action inconnue",
            (InvalidResourceOrAction, En) => "Unknown resource or action",
            (InvalidResourceOrAction, Ar) => "مورد أو إجراء غير معروف",

            (InvitationNotFound, Fr) => "Invitation introuvable",
            (InvitationNotFound, En) => "Invitation not found",
            (InvitationNotFound, Ar) => "الدعوة غير موجودة",

            (InvitationInvalidOrExpired, Fr) => "Invitation invalide ou expirée",
            (InvitationInvalidOrExpired, En) => "Invalid or expired invitation",
            (InvitationInvalidOrExpired, Ar) => "الدعوة غير صالحة أو منتهية الصلاحية",

            (InvitationEmailMismatch, Fr) => "L'adresse email ne correspond pas à l'invitation",
            (InvitationEmailMismatch, En) => "Email address does not match the invitation",
            (InvitationEmailMismatch, Ar) => "البريد الإلكتروني لا يطابق الدعوة",

            (InvitationAlreadyPending, Fr) => {
                "Une invitation est déjà en attente pour cette adresse"
            }
            (InvitationAlreadyPending, En) => "An invitation is already pending for this address",
            (InvitationAlreadyPending, Ar) => "توجد دعوة معلقة بالفعل لهذا العنوان",

            (RevokeTargetRequired, Fr) => "Spécifiez id ou token",
            (RevokeTargetRequired, En) => "Specify either id or token",
            (RevokeTargetRequired, Ar) => "حدد المعرف أو الرمز",

            (AccountCreationFailed, Fr) => "Erreur de création du compte",
            (AccountCreationFailed, En) => "Account creation failed",
            (AccountCreationFailed, Ar) => "فشل إنشاء الحساب",

            (ProfileCreationFailed, Fr) => "Erreur lors de la création du profil utilisateur",
            (ProfileCreationFailed, En) => "Failed to create the user profile",
            (ProfileCreationFailed, Ar) => "فشل إنشاء ملف المستخدم",

            (OrganizationCreationFailed, Fr) => "Erreur lors de la création de l'organisation",
            (OrganizationCreationFailed, En) => "Failed to create the organization",
            (OrganizationCreationFailed, Ar) => "فشل إنشاء المنظمة",

            (InvitationCreationFailed, Fr) => "Erreur lors de la création de l'invitation",
            (InvitationCreationFailed, En) => "Failed to create the invitation",
            (InvitationCreationFailed, Ar) => "فشل إنشاء الدعوة",

            (InvitationUpdateFailed, Fr) => "Erreur de mise à jour de l'invitation",
            (InvitationUpdateFailed, En) => "Failed to update the invitation",
            (InvitationUpdateFailed, Ar) => "فشل تحديث الدعوة",

            (RevocationFailed, Fr) => "Erreur lors de la révocation",
            (RevocationFailed, En) => "Failed to revoke the invitation",
            (RevocationFailed, Ar) => "فشل إلغاء الدعوة",

            (InvalidCredentials, Fr) => "Identifiants invalides",
            (InvalidCredentials, En) => "Invalid credentials",
            (InvalidCredentials, Ar) => "بيانات الاعتماد غير صالحة",

            (Unauthenticated, Fr) => "Utilisateur non authentifié",
            (Unauthenticated, En) => "User not authenticated",
            (Unauthenticated, Ar) => "المستخدم غير مصادق عليه",

            (Forbidden, Fr) => "Accès refusé",
            (Forbidden, En) => "Access denied",
            (Forbidden, Ar) => "تم رفض الوصول",

            (UserNotFound, Fr) => "Erreur lors de la récupération des données utilisateur",
            (UserNotFound, En) => "Failed to load user data",
            (UserNotFound, Ar) => "فشل تحميل بيانات المستخدم",

            (ResourceNotFound, Fr) => "La ressource demandée est introuvable",
            (ResourceNotFound, En) => "The requested resource was not found",
            (ResourceNotFound, Ar) => "المورد المطلوب غير موجود",

            (Conflict, Fr) => "Conflit avec l'état actuel de la ressource",
            (Conflict, En) => "Conflicts with the current state of the resource",
            (Conflict, Ar) => "تعارض مع الحالة الحالية للمورد",

            (InternalError, Fr) => "Erreur interne du serveur",
            (InternalError, En) => "Internal server error",
            (InternalError, Ar) => "خطأ داخلي في الخادم",
        }
    }
}

/// Re-renders `{message}` bodies of responses tagged with a [`MessageKey`].
pub async fn localize_messages(req: Request, next: Next) -> Response {
    let language = req
        .headers()
        .get(ACCEPT_LANGUAGE)
        .and_then(|value| value.to_str().ok())
        .map(Language::from_accept_language)
        .unwrap_or_default();

    let response = next.run(req).await;
    let Some(key) = response.extensions().get::<MessageKey>().copied() else {
        return response;
    };

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(CONTENT_LENGTH);
    parts
        .headers
        .insert(CONTENT_LANGUAGE, HeaderValue::from_static(language.code()));
    (
        parts,
        Json(serde_json::json!({ "message": key.translate(language) })),
    )
        .into_response()
}
