//! Cart commands.
//!
//! Each run is one session: the cart is mounted, the requested identity is
//! applied, the action runs, and the cart is printed. The last signed-in
//! user is kept in device storage under [`LAST_USER_KEY`], so a run without
//! `--user` after a signed-in run is a sign-out, and a run with a new
//! `--user` is a sign-in that merges the device cart exactly once. A user
//! is only remembered after their merge completed; until then every run
//! signs in afresh and retries it.

use std::fmt::Write as _;
use std::sync::Arc;

use crumb_cart::catalog::{CatalogLookup, HttpCatalog, StaticCatalog, lookup_summary};
use crumb_cart::config::{CartConfig, CatalogSource};
use crumb_cart::enrichment::subtotal;
use crumb_cart::local::{FileStorage, KeyValueStorage, LocalCartStore};
use crumb_cart::remote::{
    DisconnectedRemoteStore, PgRemoteCartStore, RemoteCartStore, create_pool,
};
use crumb_cart::{CartDependencies, CartError, CartFacade};
use crumb_core::{DisplayCartLine, Identity, ProductId, UserId};
use thiserror::Error;
use tracing::{info, warn};

/// Storage key of the last signed-in user.
pub const LAST_USER_KEY: &str = "crumbLastUser";

/// What to do with the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Show,
    Add { product_id: ProductId, quantity: u32 },
    Set { product_id: ProductId, quantity: u32 },
    Remove { product_id: ProductId },
    Clear,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Unknown product: {0}")]
    UnknownProduct(ProductId),
}

/// Run one cart action as `user` (or signed out).
///
/// # Errors
///
/// Returns an error if the catalog or a requested remote store cannot be
/// set up, or if `add` names a product the catalog does not know.
/// Persistence problems are printed as warnings instead.
pub async fn run(
    config: &CartConfig,
    user: Option<UserId>,
    action: Action,
) -> Result<(), Box<dyn std::error::Error>> {
    let storage: Arc<dyn KeyValueStorage> = Arc::new(FileStorage::new(&config.local_store_path));
    let last_user = read_last_user(storage.as_ref()).await;

    let catalog = build_catalog(config).await?;
    let remote = connect_remote(config, user.is_some(), last_user.is_some()).await?;

    let deps = CartDependencies {
        local: LocalCartStore::new(storage.clone(), config.local_cart_key.clone()),
        remote,
        catalog: catalog.clone(),
    };
    let (cart, mut warnings) = open_session(deps, last_user, user).await;

    let outcome = match action {
        Action::Show => None,
        Action::Add {
            product_id,
            quantity,
        } => {
            let product = lookup_summary(catalog.as_ref(), &product_id)
                .await?
                .ok_or(CommandError::UnknownProduct(product_id))?;
            Some(cart.add(&product, quantity).await)
        }
        Action::Set {
            product_id,
            quantity,
        } => Some(cart.set_quantity(&product_id, quantity).await),
        Action::Remove { product_id } => Some(cart.remove(&product_id).await),
        Action::Clear => Some(cart.clear().await),
    };
    if let Some(outcome) = outcome {
        warnings.extend(outcome.warnings);
    }

    close_session(storage.as_ref(), &cart).await;

    let output = render(&cart.identity(), &cart.get_cart(), cart.lines().len(), &warnings);
    #[allow(clippy::print_stdout)]
    {
        print!("{output}");
    }

    Ok(())
}

/// Mount the cart as it was left by the previous run, then apply `user`.
pub async fn open_session(
    deps: CartDependencies,
    last_user: Option<UserId>,
    user: Option<UserId>,
) -> (CartFacade, Vec<CartError>) {
    let (cart, outcome) = match last_user {
        Some(last_user) => CartFacade::resume(deps, last_user).await,
        None => CartFacade::mount(deps, Identity::SignedOut).await,
    };
    let mut warnings = outcome.warnings;

    let identity = Identity::from(user);
    if cart.identity() != identity {
        info!(signed_in = identity.is_signed_in(), "Identity changed since last run");
        warnings.extend(cart.set_identity(identity).await.warnings);
    }

    (cart, warnings)
}

/// Remember who the session ended signed in as.
///
/// A signed-in user whose merge is still pending is not recorded, so the
/// next run mounts the device cart and merges it instead of resuming over
/// it.
pub async fn close_session(storage: &dyn KeyValueStorage, cart: &CartFacade) {
    let pending = cart.merge_pending().await;
    match cart.identity() {
        Identity::SignedOut => write_last_user(storage, None).await,
        Identity::SignedIn(user) if pending => {
            warn!(user_id = %user, "Merge still pending, not remembering user");
        }
        Identity::SignedIn(user) => write_last_user(storage, Some(&user)).await,
    }
}

async fn build_catalog(
    config: &CartConfig,
) -> Result<Arc<dyn CatalogLookup>, Box<dyn std::error::Error>> {
    let catalog: Arc<dyn CatalogLookup> = match &config.catalog.source {
        CatalogSource::Http(endpoint) => Arc::new(HttpCatalog::new(
            endpoint.clone(),
            config.catalog.cache_ttl,
            config.catalog.timeout,
        )?),
        CatalogSource::File(path) => Arc::new(StaticCatalog::from_yaml_file(path).await?),
    };
    Ok(catalog)
}

/// Connect the remote store.
///
/// Required when signing in. When only signing out, an unreachable store
/// degrades to the device cache.
async fn connect_remote(
    config: &CartConfig,
    signing_in: bool,
    was_signed_in: bool,
) -> Result<Arc<dyn RemoteCartStore>, Box<dyn std::error::Error>> {
    if !signing_in && !was_signed_in {
        return Ok(Arc::new(DisconnectedRemoteStore));
    }

    let database_url = match config.require_database_url() {
        Ok(url) => url,
        Err(e) if signing_in => return Err(e.into()),
        Err(e) => {
            warn!("Signing out without a remote store: {e}");
            return Ok(Arc::new(DisconnectedRemoteStore));
        }
    };

    match create_pool(database_url).await {
        Ok(pool) => Ok(Arc::new(PgRemoteCartStore::new(pool))),
        Err(e) if signing_in => Err(e.into()),
        Err(e) => {
            warn!("Signing out without a remote store: {e}");
            Ok(Arc::new(DisconnectedRemoteStore))
        }
    }
}

async fn read_last_user(storage: &dyn KeyValueStorage) -> Option<UserId> {
    match storage.get(LAST_USER_KEY).await {
        Ok(user) => user.filter(|u| !u.is_empty()).map(UserId::new),
        Err(e) => {
            warn!("Failed to read last signed-in user: {e}");
            None
        }
    }
}

async fn write_last_user(storage: &dyn KeyValueStorage, user: Option<&UserId>) {
    let result = match user {
        Some(user) => storage.set(LAST_USER_KEY, user.as_str()).await,
        None => storage.remove(LAST_USER_KEY).await,
    };
    if let Err(e) = result {
        warn!("Failed to remember signed-in user: {e}");
    }
}

/// Format the cart for the terminal.
fn render(
    identity: &Identity,
    view: &[DisplayCartLine],
    line_count: usize,
    warnings: &[CartError],
) -> String {
    let mut out = String::new();

    let _ = match identity.user_id() {
        Some(user) => writeln!(out, "Cart (signed in as {user})"),
        None => writeln!(out, "Cart (signed out)"),
    };

    if line_count == 0 {
        let _ = writeln!(out, "  (empty)");
    }
    for line in view {
        let _ = writeln!(
            out,
            "  {:>3} x {:<28} {:>9}  [{}]",
            line.quantity.get(),
            line.name,
            line.line_total().display(),
            line.product_id
        );
    }

    let hidden = line_count.saturating_sub(view.len());
    if hidden > 0 {
        let _ = writeln!(out, "  ({hidden} item(s) unavailable)");
    }
    let _ = writeln!(out, "Subtotal: {}", subtotal(view).display());

    for warning in warnings {
        let _ = writeln!(out, "warning: {warning}");
    }

    out
}
