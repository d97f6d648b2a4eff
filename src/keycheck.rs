//! Comparing exo-link key values against the key segments of the matched
//! filenames.
//!
//! A top-object filename carries the object's key values joined by `+`
//! ahead of the guid. Each resolved key value from the root document must
//! reappear verbatim in its position; unresolved key values were already
//! reported during extraction and are not compared again here.

use std::path::Path;

use crate::error::ErrorCode;
use crate::exolink::ExoLinkSet;
use crate::matcher::ObjectIdentifier;
use crate::report::RunReport;

const UNKNOWN_OBJECT_LABEL: &str = "*unknown-package*.*unknown-class*";

/// Checks every matched file's name keys against its exo link, in link
/// order. Reference files are held to the same keys as project files.
pub fn check_keys(
    matched: &[ObjectIdentifier],
    links: &ExoLinkSet,
    model_dir: &Path,
    report: &mut RunReport,
) {
    let num_active = matched.iter().filter(|object| object.exists()).count();

    report.blank_note();
    report.note(format!(
        "checking the exo link keys in {num_active} top object file names"
    ));

    let mut good = 0usize;
    for (i, identifier) in matched.iter().enumerate() {
        let number = i + 1;
        let guid = &identifier.guid;
        let short = links
            .get(guid)
            .map(|link| link.short_name())
            .unwrap_or_else(|| UNKNOWN_OBJECT_LABEL.to_string());

        let Some(relative) = &identifier.path else {
            report.note_plain(format!("{number:>3}. {guid} {short} - the file is missing"));
            continue;
        };
        let Some(link) = links.get(guid) else {
            continue;
        };

        let full = model_dir.join(relative);
        let file_name = relative
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut ok = true;
        for (j, (key_name, value)) in link.keys.iter().enumerate() {
            let Some(value) = value.as_deref() else {
                continue;
            };
            let segment = identifier.filename_keys.get(j).map(String::as_str);
            if segment == Some(value) {
                continue;
            }
            let detail = [
                format!("in the exo linked file {file_name} {short}"),
                format!(
                    "the key {key_name} [index {}] in the exo link does not match the key in the file name",
                    j + 1,
                ),
                format!(
                    "key in the exo link: {value}, key in the file name: {}",
                    segment.unwrap_or("*absent*"),
                ),
            ]
            .join("\n");
            report.error(
                ErrorCode::ExoLinkedFileHasWrongKey,
                full.display().to_string(),
                detail.clone(),
            );
            report.note_plain(format!(
                "{number:>3}. [key {}] {guid} {short} - {detail} [ERROR]",
                j + 1,
            ));
            ok = false;
        }

        if ok {
            report.note_plain(format!("{number:>3}. {guid} {short} - all keys are good"));
            good += 1;
        }
    }

    report.note(format!("{good} of the {num_active} keys are good"));
}
