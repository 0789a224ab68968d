//! Account commands.
//!
//! A successful login or registration publishes one auth event. The event
//! is picked up here and handed to the reconciliation engine, so the
//! command returns only after the local and server carts are merged.

use mattys_media_client::StorefrontContext;
use mattys_media_client::reconcile::{PushStatus, ReconcileOutcome};
use mattys_media_client::services::auth::{AuthError, AuthEvent};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::broadcast;

use super::cart::render;

/// Sign in and reconcile the cart.
///
/// # Errors
///
/// Returns `AuthError` if the backend rejects the credentials.
#[allow(clippy::print_stdout)]
pub async fn login(
    ctx: &StorefrontContext,
    email: &str,
    password: SecretString,
) -> Result<(), AuthError> {
    let mut events = ctx.auth().subscribe();
    let user = ctx.api().login(email, password.expose_secret()).await?;
    println!("Signed in as {} <{}>", user.name, user.email);
    reconcile_pending(ctx, &mut events).await;
    Ok(())
}

/// Create an account and reconcile the cart.
///
/// # Errors
///
/// Returns `AuthError` if the email is already registered.
#[allow(clippy::print_stdout)]
pub async fn register(
    ctx: &StorefrontContext,
    email: &str,
    name: &str,
    password: SecretString,
) -> Result<(), AuthError> {
    let mut events = ctx.auth().subscribe();
    let user = ctx
        .api()
        .register(email, password.expose_secret(), name)
        .await?;
    println!("Welcome, {}! Account created for {}", user.name, user.email);
    reconcile_pending(ctx, &mut events).await;
    Ok(())
}

/// Sign out, keeping the cart.
///
/// # Errors
///
/// Returns `AuthError::Storage` if the credential cannot be removed.
#[allow(clippy::print_stdout)]
pub fn logout(ctx: &StorefrontContext) -> Result<(), AuthError> {
    ctx.logout()?;
    println!("Signed out. Your cart has been kept.");
    Ok(())
}

/// Print the signed-in user, if any.
#[allow(clippy::print_stdout)]
pub async fn whoami(ctx: &StorefrontContext) {
    match ctx.bootstrap().await {
        Some(user) => println!("{} <{}> ({})", user.name, user.email, user.id),
        None => println!("Not signed in."),
    }
}

#[allow(clippy::print_stdout)]
async fn reconcile_pending(
    ctx: &StorefrontContext,
    events: &mut broadcast::Receiver<AuthEvent>,
) {
    while let Ok(event) = events.try_recv() {
        let outcome = ctx.engine().handle(&event).await;
        println!("{}", describe(&outcome));
    }
    print!("{}", render(&ctx.store().current()));
}

fn describe(outcome: &ReconcileOutcome) -> String {
    let push_note = |push: &PushStatus| match push {
        PushStatus::Pushed => String::new(),
        PushStatus::Failed(e) => format!(" (server not updated: {e})"),
    };

    match outcome {
        ReconcileOutcome::Aborted { error } => {
            format!("Could not load your saved cart ({error}); local cart unchanged.")
        }
        ReconcileOutcome::SeededRemote { pushed, push } => {
            format!("Saved {} cart line(s) to your account{}", pushed.len(), push_note(push))
        }
        ReconcileOutcome::Merged { merged, push, .. } => {
            format!(
                "Merged your cart with your saved cart: {} line(s){}",
                merged.len(),
                push_note(push)
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use mattys_media_client::reconcile::RemoteError;
    use mattys_media_core::Cart;

    use super::*;

    #[test]
    fn test_describe_aborted() {
        let outcome = ReconcileOutcome::Aborted {
            error: RemoteError::Unavailable("timeout".to_string()),
        };
        assert_eq!(
            describe(&outcome),
            "Could not load your saved cart (remote unavailable: timeout); local cart unchanged."
        );
    }

    #[test]
    fn test_describe_seeded_with_push_failure() {
        let outcome = ReconcileOutcome::SeededRemote {
            pushed: Cart::new(),
            push: PushStatus::Failed(RemoteError::NotAuthenticated),
        };
        assert_eq!(
            describe(&outcome),
            "Saved 0 cart line(s) to your account (server not updated: not authenticated)"
        );
    }
}
