use proc_macro::TokenStream;

mod job;

/// Marks an async function as a Stoker job class.
///
/// Generates a unit struct named after the function (`send_welcome_email`
/// becomes `SendWelcomeEmailJob`) implementing `StokerJob`. The first
/// parameter is the job context; the remaining parameters are the job's
/// positional arguments, carried on the wire in declaration order.
///
/// # Attributes
/// - `name = "Mailer"` - Wire class name (defaults to the struct name)
/// - `queue = "mailer"` - Queue the class lands on
/// - `priority = 100` or `priority = "high"` - Class priority, numeric or labelled
/// - `ttr = 300` - Time-to-run in seconds
///
/// # Example
/// ```ignore
/// #[stoker::job]
/// #[queue = "mailer"]
/// #[priority = "high"]
/// pub async fn send_welcome_email(ctx: &JobContext, user_id: u64, locale: String) -> Result<()> {
///     mailer::welcome(user_id, &locale).await
/// }
///
/// dispatcher
///     .enqueue::<SendWelcomeEmailJob>((42, "en".into()), EnqueueOptions::new())
///     .await?;
/// ```
#[proc_macro_attribute]
pub fn job(attr: TokenStream, item: TokenStream) -> TokenStream {
    job::job_impl(attr, item)
}
