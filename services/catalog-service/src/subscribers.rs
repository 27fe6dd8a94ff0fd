// =============================================================================
// SUBSCRIBERS MODULE
// =============================================================================
// Email intake for the storefront's sign-up forms.
//
// An address is recorded once. The lookup key is the trimmed, lowercased
// email; a repeat submission returns the existing record's id and writes
// nothing.
// =============================================================================

use chrono::{DateTime, Utc};
use lazy_regex::regex_is_match;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    Attribution, CollectEmailRequest, ConsentRecord, EmailSubscriber, MarketingEmail,
    MarketingPreferences,
};
use crate::store::CatalogStore;

const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 15;

/// Request metadata kept as consent evidence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsentContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionOutcome {
    pub id: Uuid,
    /// false when the address was already on file
    pub created: bool,
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> bool {
    regex_is_match!(r"^[^\s@]+@[^\s@]+\.[^\s@]+$", email)
}

/// A phone number is valid when it holds 7 to 15 digits once punctuation
/// and spaces are stripped.
pub fn validate_phone(phone: &str) -> bool {
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits)
}

/// Records `request.email` unless it is already subscribed.
///
/// # Errors
/// `Validation` when the email is missing or malformed, or a phone number is
/// given but does not validate.
pub async fn collect_email(
    store: &dyn CatalogStore,
    request: CollectEmailRequest,
    consent: ConsentContext,
    now: DateTime<Utc>,
) -> AppResult<SubscriptionOutcome> {
    let email = request
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::Validation("Email is required".to_string()))?;
    if !validate_email(&email) {
        return Err(AppError::Validation(format!("Invalid email address: {email}")));
    }

    let phone = request
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string);
    if let Some(phone) = &phone {
        if !validate_phone(phone) {
            return Err(AppError::Validation(format!("Invalid phone number: {phone}")));
        }
    }

    let source = request.source.unwrap_or_default();

    if let Some(existing) = store.find_subscriber_by_email(&email).await? {
        // The merged list is reported, not stored.
        let mut sources = existing.sources.clone();
        if !sources.contains(&source) {
            sources.push(source);
        }
        tracing::info!(
            subscriber_id = %existing.id,
            ?source,
            ?sources,
            "Email already subscribed"
        );
        return Ok(SubscriptionOutcome {
            id: existing.id,
            created: false,
        });
    }

    let subscriber = EmailSubscriber {
        id: Uuid::new_v4(),
        email,
        phone,
        source,
        sources: vec![source],
        subscribed: true,
        marketing: MarketingPreferences {
            email_opt_in: request.email_opt_in.unwrap_or(true),
            sms_opt_in: request.sms_opt_in.unwrap_or(false),
        },
        consent: ConsentRecord {
            consented_at: now,
            ip_address: consent.ip_address,
            user_agent: consent.user_agent,
        },
        attribution: Attribution {
            campaign: request.campaign,
            utm_source: request.utm_source,
            utm_medium: request.utm_medium,
            utm_campaign: request.utm_campaign,
            referrer: request.referrer,
        },
        created_at: now,
    };
    let marketing = MarketingEmail::from(&subscriber);

    store.insert_subscriber(&subscriber, &marketing).await?;

    tracing::info!(subscriber_id = %subscriber.id, ?source, "Email subscribed");

    Ok(SubscriptionOutcome {
        id: subscriber.id,
        created: true,
    })
}

/// Removes the primary subscriber record. The marketing copy is kept.
pub async fn unsubscribe(store: &dyn CatalogStore, id: Uuid) -> AppResult<()> {
    if !store.delete_subscriber(id).await? {
        return Err(AppError::NotFound(format!("Subscriber not found: {id}")));
    }
    tracing::info!(subscriber_id = %id, "Email unsubscribed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubscriberSource;
    use crate::store::MemoryStore;

    fn request(email: &str) -> CollectEmailRequest {
        CollectEmailRequest {
            email: Some(email.to_string()),
            ..CollectEmailRequest::default()
        }
    }

    #[test]
    fn validates_emails() {
        assert!(validate_email("jane@example.com"));
        assert!(validate_email("a.b+c@sub.example.co"));
        assert!(!validate_email("jane@example"));
        assert!(!validate_email("jane example@x.com"));
        assert!(!validate_email("@example.com"));
        assert!(!validate_email(""));
    }

    #[test]
    fn validates_phones() {
        assert!(validate_phone("(555) 123-4567"));
        assert!(validate_phone("+44 20 7946 0958"));
        assert!(!validate_phone("12-34"));
        assert!(!validate_phone("1234567890123456"));
    }

    #[tokio::test]
    async fn same_address_is_stored_once() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let first = collect_email(&store, request("  Test@Example.com "), ConsentContext::default(), now)
            .await
            .unwrap();
        let second = collect_email(&store, request("test@example.com"), ConsentContext::default(), now)
            .await
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.id, second.id);

        let subscribers = store.subscribers().await;
        assert_eq!(subscribers.len(), 1);
        assert_eq!(subscribers[0].email, "test@example.com");
        assert_eq!(store.marketing_emails().await.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_does_not_rewrite_sources() {
        let store = MemoryStore::new();
        let now = Utc::now();
        collect_email(&store, request("a@b.co"), ConsentContext::default(), now)
            .await
            .unwrap();

        let footer = CollectEmailRequest {
            source: Some(SubscriberSource::Footer),
            ..request("a@b.co")
        };
        collect_email(&store, footer, ConsentContext::default(), now)
            .await
            .unwrap();

        let subscribers = store.subscribers().await;
        assert_eq!(subscribers[0].sources, vec![SubscriberSource::Popup]);
    }

    #[tokio::test]
    async fn records_consent_and_attribution() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let req = CollectEmailRequest {
            phone: Some("555-123-4567".to_string()),
            source: Some(SubscriberSource::Checkout),
            sms_opt_in: Some(true),
            utm_campaign: Some("spring".to_string()),
            ..request("buyer@shop.com")
        };
        let consent = ConsentContext {
            ip_address: Some("203.0.113.9".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
        };

        collect_email(&store, req, consent, now).await.unwrap();

        let subscriber = &store.subscribers().await[0];
        assert_eq!(subscriber.phone.as_deref(), Some("555-123-4567"));
        assert_eq!(subscriber.source, SubscriberSource::Checkout);
        assert!(subscriber.marketing.email_opt_in);
        assert!(subscriber.marketing.sms_opt_in);
        assert_eq!(subscriber.consent.ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(subscriber.consent.consented_at, now);
        assert_eq!(subscriber.attribution.utm_campaign.as_deref(), Some("spring"));

        let marketing = &store.marketing_emails().await[0];
        assert_eq!(marketing.subscriber_id, subscriber.id);
        assert!(marketing.sms_opt_in);
    }

    #[tokio::test]
    async fn rejects_bad_input_without_writing() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let missing = collect_email(&store, CollectEmailRequest::default(), ConsentContext::default(), now).await;
        assert!(matches!(missing, Err(AppError::Validation(_))));

        let bad_email = collect_email(&store, request("not-an-email"), ConsentContext::default(), now).await;
        assert!(matches!(bad_email, Err(AppError::Validation(_))));

        let bad_phone = CollectEmailRequest {
            phone: Some("12345".to_string()),
            ..request("ok@example.com")
        };
        let result = collect_email(&store, bad_phone, ConsentContext::default(), now).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        assert!(store.subscribers().await.is_empty());
    }

    #[tokio::test]
    async fn unsubscribe_removes_primary_record() {
        let store = MemoryStore::new();
        let outcome = collect_email(&store, request("bye@example.com"), ConsentContext::default(), Utc::now())
            .await
            .unwrap();

        unsubscribe(&store, outcome.id).await.unwrap();
        assert!(store.subscribers().await.is_empty());
        assert_eq!(store.marketing_emails().await.len(), 1);

        let again = unsubscribe(&store, outcome.id).await;
        assert!(matches!(again, Err(AppError::NotFound(_))));
    }
}
