use crate::domain::{
    conversion::{ConversionModel, DocumentFormat},
    route::Route,
};

const FALLBACK_FILENAME: &str = "document";

/// Download filename for a converted model: `<name>.<ext>`.
///
/// Nested items are named after their last route segment, the root item after
/// its title. Anything that does not survive as a single route component is
/// replaced by `document`.
pub fn derive_filename(model: &ConversionModel, format: DocumentFormat) -> String {
    let base = base_name(model).unwrap_or_else(|| FALLBACK_FILENAME.to_string());
    format!("{base}.{}", format.extension())
}

fn base_name(model: &ConversionModel) -> Option<String> {
    let route = Route::parse(&model.route).ok()?;
    let candidate = if model.level == 0 {
        model.title.as_str()
    } else {
        route.last_component_name()
    };

    Route::component(candidate)
        .ok()
        .map(|component| component.last_component_name().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversion::ItemKind;

    fn model(route: &str, title: &str, level: usize) -> ConversionModel {
        ConversionModel {
            route: route.to_string(),
            title: title.to_string(),
            description: String::new(),
            level,
            kind: ItemKind::Document,
            content_html: String::new(),
        }
    }

    #[test]
    fn nested_items_use_last_segment() {
        let model = model("a/b/c", "Ignored Title", 2);
        assert_eq!(derive_filename(&model, DocumentFormat::Rtf), "c.rtf");
    }

    #[test]
    fn root_item_uses_title() {
        let model = model("", "My Document", 0);
        assert_eq!(derive_filename(&model, DocumentFormat::Rtf), "My Document.rtf");
    }

    #[test]
    fn unusable_names_fall_back_to_document() {
        let reserved = model("", "Q&A: part 1", 0);
        assert_eq!(derive_filename(&reserved, DocumentFormat::Docx), "document.docx");

        let nested_title = model("", "a/b", 0);
        assert_eq!(derive_filename(&nested_title, DocumentFormat::Rtf), "document.rtf");

        let blank_title = model("", "   ", 0);
        assert_eq!(derive_filename(&blank_title, DocumentFormat::Epub), "document.epub");

        let bad_route = model("a/../b", "Title", 1);
        assert_eq!(derive_filename(&bad_route, DocumentFormat::Odt), "document.odt");
    }

    #[test]
    fn derivation_is_deterministic() {
        let model = model("guides/install", "Install", 1);
        assert_eq!(
            derive_filename(&model, DocumentFormat::Rtf),
            derive_filename(&model, DocumentFormat::Rtf)
        );
        assert_eq!(derive_filename(&model, DocumentFormat::Rtf), "install.rtf");
    }
}
