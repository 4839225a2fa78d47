use super::chart_output::{output_event, print_chart, ChartOutputEvent};
use super::{ChartArgs, CommandContext};
use chrono::Utc;
use lastfm_charts::{ChartEvent, ChartEventReceiver, Granularity, Period};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;

/// A period as given on the command line; missing parts come from the latest scrobble.
pub enum PeriodRequest {
    Week {
        year: Option<i32>,
        week: Option<u32>,
    },
    Month {
        year: Option<i32>,
        month: Option<u32>,
    },
    Year {
        year: Option<i32>,
    },
}

impl PeriodRequest {
    fn granularity(&self) -> Granularity {
        match self {
            PeriodRequest::Week { .. } => Granularity::Week,
            PeriodRequest::Month { .. } => Granularity::Month,
            PeriodRequest::Year { .. } => Granularity::Year,
        }
    }

    fn is_complete(&self) -> bool {
        match self {
            PeriodRequest::Week { year, week } => year.is_some() && week.is_some(),
            PeriodRequest::Month { year, month } => year.is_some() && month.is_some(),
            PeriodRequest::Year { year } => year.is_some(),
        }
    }
}

/// Resolve the requested period, asking Last.fm for the latest scrobble if needed.
async fn resolve_period(
    context: &CommandContext<'_>,
    request: PeriodRequest,
) -> Result<Period, Box<dyn std::error::Error>> {
    let latest = if request.is_complete() {
        None
    } else {
        let latest = context
            .engine
            .latest_period(context.user, request.granularity())
            .await?;
        match latest {
            Some(period) => Some(period),
            None => {
                return Err(format!(
                    "'{}' has no scrobbles yet; pass the period explicitly",
                    context.user
                )
                .into())
            }
        }
    };

    let period = match (request, latest) {
        (PeriodRequest::Week { year, week }, latest) => {
            let (latest_year, latest_week) = match latest {
                Some(Period::Week { iso_year, iso_week }) => (iso_year, iso_week),
                _ => (0, 0),
            };
            Period::week(year.unwrap_or(latest_year), week.unwrap_or(latest_week))?
        }
        (PeriodRequest::Month { year, month }, latest) => {
            let (latest_year, latest_month) = match latest {
                Some(Period::Month { year, month }) => (year, month),
                _ => (0, 0),
            };
            Period::month(year.unwrap_or(latest_year), month.unwrap_or(latest_month))?
        }
        (PeriodRequest::Year { year }, latest) => {
            let latest_year = match latest {
                Some(Period::Year { year }) => year,
                _ => 0,
            };
            Period::year(year.unwrap_or(latest_year))
        }
    };

    Ok(period)
}

/// Handle the week, month and year commands
pub async fn handle_chart(
    context: &CommandContext<'_>,
    request: PeriodRequest,
    args: &ChartArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let period = resolve_period(context, request).await?.offset(args.offset);

    // Nothing has been scrobbled in a period that has not started yet
    if period.start()? > Utc::now() {
        return Err(format!("{period} has not started yet").into());
    }

    log::info!("Computing {} chart {period} for '{}'", period.granularity(), context.user);

    let (done_tx, done_rx) = oneshot::channel();
    let progress = tokio::spawn(report_progress(context.engine.subscribe(), done_rx));
    let result = context.engine.chart(context.user, period).await;
    let _ = done_tx.send(());
    if let Err(e) = progress.await {
        log::debug!("Progress reporter stopped: {e}");
    }
    let chart = result?;

    if args.json {
        output_event(&ChartOutputEvent::ChartStarted {
            user: context.user,
            period: &chart.period,
        });
        for entry in &chart.entries {
            output_event(&ChartOutputEvent::EntryFound { entry });
        }
        output_event(&ChartOutputEvent::ChartFinished {
            total_entries: chart.entries.len(),
        });
    } else {
        print_chart(context.user, &chart);
    }

    Ok(())
}

/// Print fetch progress to stderr while a chart is being computed.
///
/// Once `done` fires, events still queued are printed before returning.
/// Returns the number of events received.
async fn report_progress(mut events: ChartEventReceiver, mut done: oneshot::Receiver<()>) -> usize {
    let mut received_events = 0;
    loop {
        tokio::select! {
            biased;
            received = events.recv() => match received {
                Ok(event) => {
                    received_events += 1;
                    print_progress(&event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::debug!("Progress reporter skipped {skipped} events");
                }
                Err(RecvError::Closed) => return received_events,
            },
            _ = &mut done => {
                while let Ok(event) = events.try_recv() {
                    received_events += 1;
                    print_progress(&event);
                }
                return received_events;
            }
        }
    }
}

fn print_progress(event: &ChartEvent) {
    match event {
        ChartEvent::FetchStarted {
            iso_year, iso_week, ..
        } => {
            eprintln!("⏳ Loading {iso_year}-W{iso_week:02} from Last.fm...");
        }
        ChartEvent::SourceUnavailable { page, error, .. } => {
            eprintln!("⚠️  Last.fm failed on page {page}, chart may be incomplete: {error}");
        }
        ChartEvent::PersistenceFailed { error, .. } => {
            eprintln!("⚠️  Could not save the cache: {error}");
        }
        _ => {}
    }
}
