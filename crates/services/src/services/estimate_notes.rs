//! The estimate `notes` column holds several sections in one text field:
//! free text first, then `## Scope`, `## Exclusions` and `## Terms` blocks.

use db::models::estimate::EstimateNotes;

#[derive(Clone, Copy)]
enum Section {
    General,
    Scope,
    Exclusions,
    Terms,
}

fn header(line: &str) -> Option<Section> {
    let title = line.trim().strip_prefix("##")?.trim().to_ascii_lowercase();
    match title.as_str() {
        "scope" => Some(Section::Scope),
        "exclusions" => Some(Section::Exclusions),
        "terms" => Some(Section::Terms),
        _ => None,
    }
}

/// Combine the sections into the stored form. Empty sections are omitted;
/// `None` when every section is empty.
pub fn compose(notes: &EstimateNotes) -> Option<String> {
    let mut blocks = Vec::new();
    let general = notes.general.trim();
    if !general.is_empty() {
        blocks.push(general.to_string());
    }
    for (title, body) in [
        ("Scope", &notes.scope),
        ("Exclusions", &notes.exclusions),
        ("Terms", &notes.terms),
    ] {
        let body = body.trim();
        if !body.is_empty() {
            blocks.push(format!("## {title}\n{body}"));
        }
    }
    if blocks.is_empty() {
        None
    } else {
        Some(blocks.join("\n\n"))
    }
}

/// Split a stored notes field back into sections.
///
/// Headers match case-insensitively. A `##` line that is not a known header
/// stays part of the section it appears in.
pub fn parse(raw: Option<&str>) -> EstimateNotes {
    let mut sections: [Vec<&str>; 4] = Default::default();
    let mut current = Section::General;

    for line in raw.unwrap_or_default().lines() {
        match header(line) {
            Some(section) => current = section,
            None => sections[current as usize].push(line),
        }
    }

    let [general, scope, exclusions, terms] = sections.map(|lines| lines.join("\n").trim().to_string());
    EstimateNotes {
        general,
        scope,
        exclusions,
        terms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_skips_empty_sections() {
        let notes = EstimateNotes {
            general: "Thanks for the opportunity.".to_string(),
            scope: "Demo and rebuild deck.".to_string(),
            exclusions: "  ".to_string(),
            terms: "50% deposit.".to_string(),
        };
        assert_eq!(
            compose(&notes).unwrap(),
            "Thanks for the opportunity.\n\n## Scope\nDemo and rebuild deck.\n\n## Terms\n50% deposit."
        );
        assert_eq!(compose(&EstimateNotes::default()), None);
    }

    #[test]
    fn parse_reads_back_composed_text() {
        let notes = EstimateNotes {
            general: "Intro".to_string(),
            scope: "Line one\nLine two".to_string(),
            exclusions: "Permits".to_string(),
            terms: String::new(),
        };
        assert_eq!(parse(compose(&notes).as_deref()), notes);
    }

    #[test]
    fn parse_handles_plain_text_and_header_case() {
        assert_eq!(parse(Some("Just a note")).general, "Just a note");
        assert_eq!(parse(None), EstimateNotes::default());

        let parsed = parse(Some("##  EXCLUSIONS \nPainting\n## Materials\nCedar"));
        assert_eq!(parsed.exclusions, "Painting\n## Materials\nCedar");
        assert!(parsed.general.is_empty());
    }
}
