use std::path::Path;

use serde_yaml::{Mapping, Value};

use crate::{merger::MergedDocument, utils};

/// Name of the selector group rebuilt from the merged nodes.
pub const PROXY_GROUP: &str = "PROXY";

/// Builds the selector group listing every node name, in order.
pub fn proxy_group(proxies: &[Mapping]) -> Mapping {
    let names = proxies
        .iter()
        .filter_map(|proxy| proxy.get("name").cloned())
        .collect::<Vec<_>>();

    let mut group = Mapping::new();
    group.insert("name".into(), PROXY_GROUP.into());
    group.insert("type".into(), "select".into());
    group.insert("proxies".into(), Value::Sequence(names));
    group
}

/// Puts the merged nodes into a routing template.
///
/// `proxies` is overwritten and `proxy-groups` becomes the single `PROXY`
/// group. Groups already in the template would name nodes that are gone, so
/// none of them are kept.
pub fn splice(template: &mut Mapping, proxies: Vec<Mapping>) {
    let group = Value::Mapping(proxy_group(&proxies));
    let proxies = proxies.into_iter().map(Value::Mapping).collect();
    template.insert("proxies".into(), Value::Sequence(proxies));
    template.insert("proxy-groups".into(), Value::Sequence(vec![group]));
}

/// Combines a merged document with a template and writes the result.
///
/// # Arguments
///
/// * `merged`: Path of a document produced by the merge step.
/// * `template`: Path of the routing template.
/// * `output`: Where to write the combined document.
///
/// # Returns
///
/// The number of nodes written.
pub fn merge_template(merged: &Path, template: &Path, output: &Path) -> anyhow::Result<usize> {
    let document: MergedDocument = utils::read_yaml(merged)?;
    let mut config: Mapping = utils::read_yaml(template)?;
    let count = document.proxies.len();

    splice(&mut config, document.proxies);
    utils::write_yaml(output, &config)?;

    #[cfg(feature = "log")]
    log::debug!("Spliced {} nodes into {}", count, template.display());
    Ok(count)
}
