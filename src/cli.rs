use bekya::{
    Marketplace,
    core::{lifecycle::TransitionOutcome, pricing},
    entities::Category,
    errors::Result,
};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "bekya", about = "Bekya moderator console", long_about = None)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create the moderator profiles listed in the settings file
    Init,
    /// Run the pricing heuristic on an item
    Analyze(AnalyzeArgs),
    /// List listings waiting for review
    Pending,
    /// Approve a pending listing
    Approve(ApproveArgs),
    /// Reject a pending listing
    Reject(RejectArgs),
    /// Send the seller a counter-offer
    Negotiate(NegotiateArgs),
    /// Accept a counter-offer as the seller
    Accept(SellerArgs),
    /// Decline a counter-offer as the seller
    Decline(SellerArgs),
    /// Delete a listing and its notifications
    Delete(ModeratorArgs),
    /// Show a user's notifications
    Notifications(NotificationsArgs),
}

#[derive(Debug, Args)]
struct AnalyzeArgs {
    /// Item title
    #[arg(long)]
    title: String,

    /// Item description
    #[arg(long, default_value = "")]
    description: String,

    /// Category (furniture, electronics, books, clothes, toys, other)
    #[arg(long, value_parser = parse_category)]
    category: Category,

    /// Price originally paid, in EGP
    #[arg(long)]
    price: f64,
}

#[derive(Debug, Args)]
struct ModeratorArgs {
    /// Moderator profile id
    #[arg(long = "as")]
    moderator: String,

    /// Listing id
    listing_id: i64,
}

#[derive(Debug, Args)]
struct ApproveArgs {
    #[command(flatten)]
    target: ModeratorArgs,

    /// Final price; omit for recycle listings
    #[arg(long)]
    price: Option<f64>,
}

#[derive(Debug, Args)]
struct RejectArgs {
    #[command(flatten)]
    target: ModeratorArgs,

    /// Reason shown to the seller
    #[arg(long)]
    reason: String,
}

#[derive(Debug, Args)]
struct NegotiateArgs {
    #[command(flatten)]
    target: ModeratorArgs,

    /// Proposed price
    #[arg(long)]
    price: f64,

    /// Note shown to the seller
    #[arg(long)]
    note: Option<String>,
}

#[derive(Debug, Args)]
struct SellerArgs {
    /// Seller profile id
    #[arg(long = "as")]
    seller: String,

    /// Listing id
    listing_id: i64,
}

#[derive(Debug, Args)]
struct NotificationsArgs {
    /// Profile id
    user: String,

    /// Mark everything read after printing
    #[arg(long)]
    mark_read: bool,
}

fn parse_category(value: &str) -> std::result::Result<Category, String> {
    Category::parse(value).ok_or_else(|| format!("unknown category {value:?}"))
}

fn report(outcome: &TransitionOutcome) {
    let listing = &outcome.listing;
    println!(
        "listing {} is now {} ({} notifications sent)",
        listing.id,
        listing.status,
        outcome.notifications_sent()
    );
}

impl Cli {
    pub(crate) async fn run(self, market: &Marketplace) -> Result<()> {
        match self.command {
            Commands::Init => {
                let changed = market.seed_admins().await?;
                println!("{changed} moderator profiles created or promoted");
            }
            Commands::Analyze(args) => {
                let analysis =
                    pricing::analyze_product(&args.title, &args.description, args.category, args.price);
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            }
            Commands::Pending => {
                let pending = market.pending_listings().await?;
                if pending.is_empty() {
                    println!("no listings waiting for review");
                }
                for listing in pending {
                    let price = listing
                        .final_price
                        .or(listing.suggested_price)
                        .map_or_else(|| "-".to_string(), |p| format!("{p} EGP"));
                    println!(
                        "#{} [{:?}] {} by {} - {}",
                        listing.id, listing.category, listing.title, listing.user_id, price
                    );
                    if let Some(note) = &listing.negotiation_note {
                        println!("    {note}");
                    }
                }
            }
            Commands::Approve(args) => {
                let outcome = market
                    .approve(&args.target.moderator, args.target.listing_id, args.price)
                    .await?;
                report(&outcome);
            }
            Commands::Reject(args) => {
                let outcome = market
                    .reject(&args.target.moderator, args.target.listing_id, &args.reason)
                    .await?;
                report(&outcome);
            }
            Commands::Negotiate(args) => {
                let outcome = market
                    .negotiate(
                        &args.target.moderator,
                        args.target.listing_id,
                        args.price,
                        args.note.as_deref(),
                    )
                    .await?;
                report(&outcome);
            }
            Commands::Accept(args) => {
                report(&market.accept_negotiation(&args.seller, args.listing_id).await?);
            }
            Commands::Decline(args) => {
                report(&market.reject_negotiation(&args.seller, args.listing_id).await?);
            }
            Commands::Delete(args) => {
                let deleted = market.delete_listing(&args.moderator, args.listing_id).await?;
                println!(
                    "deleted listing {} and {} notifications",
                    deleted.listing.id, deleted.notifications_removed
                );
            }
            Commands::Notifications(args) => {
                let inbox = market.notifications(&args.user).await?;
                for row in &inbox {
                    let marker = if row.read { " " } else { "*" };
                    println!("{marker} {} {}", row.created_at.format("%Y-%m-%d %H:%M"), row.message);
                }
                println!("{} unread", market.unread_count(&args.user).await?);
                if args.mark_read {
                    market.mark_all_read(&args.user).await?;
                }
            }
        }
        Ok(())
    }
}
