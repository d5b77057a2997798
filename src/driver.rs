//! Main entry point for fetching everything.

use crate::batch::InputSpec;
use crate::errors::Result;
use crate::normalize;
use crate::options::{OptionSet, OptionsPatch};
use crate::output::{self, TrendRecord};
use crate::provider::Provider;
use crate::resolver::{self, Query};
use crate::tables::RawResponse;
use log::{debug, info, warn};

/// Options shared by every input of a run.
#[derive(Clone, Debug, Default)]
pub struct DriverArgs {
    /// Starting point for every input: built-in defaults with the settings
    /// file applied. Parameters embedded in an explorer link override these.
    pub base: OptionSet,

    /// Options given on the command line.
    /// They override link parameters, and are overridden in turn by the
    /// options of a batch file.
    pub overrides: OptionsPatch,
}

/// Build a record from a resolved query and the provider's raw tables.
pub fn assemble(input: &str, query: Query, raw: &RawResponse) -> TrendRecord {
    let topics = normalize::related_topics(&raw.related_topics);
    let queries = normalize::related_queries(&raw.related_queries);
    TrendRecord {
        input: input.to_owned(),
        search_term: output::search_term(&query.keywords),
        options: query.options,
        timeline: normalize::timeline(&raw.timeline),
        subregions: normalize::regions(&raw.subregion),
        cities: normalize::regions(&raw.city),
        topics_top: topics.top,
        topics_rising: topics.rising,
        queries_top: queries.top,
        queries_rising: queries.rising,
    }
}

/// Fetch one input: resolve it, make one provider round trip, normalize.
pub fn fetch(args: &DriverArgs, provider: &dyn Provider, spec: &InputSpec) -> Result<TrendRecord> {
    let overrides = args.overrides.overlay(&spec.overrides);
    if overrides.is_empty() {
        debug!("{}: no option overrides", spec.input);
    }
    let query = resolver::resolve(&spec.input, &args.base, &overrides)?;
    info!("fetching trends for: {}", spec.input);
    debug!("keywords: {:?}, options: {:?}", query.keywords, query.options);
    let raw = provider.fetch(&query)?;
    let record = assemble(&spec.input, query, &raw);
    debug!("{}", output::pretty_record(&record));
    Ok(record)
}

/// Fetch all inputs in order.
///
/// Entries with an empty input are skipped. The first failure aborts the
/// whole run and nothing fetched so far is returned.
pub fn fetch_all(
    args: &DriverArgs,
    provider: &dyn Provider,
    specs: &[InputSpec],
) -> Result<Vec<TrendRecord>> {
    let mut records = Vec::with_capacity(specs.len());
    for spec in specs {
        if spec.input.trim().is_empty() {
            warn!("skipping an entry with empty input");
            continue;
        }
        records.push(fetch(args, provider, spec)?);
    }
    info!("fetched: {} of {} inputs", records.len(), specs.len());
    Ok(records)
}
