//! Static bidirectional map between internal input-kind identifiers
//! and their localized (Chinese) display names, with category
//! classification and keyword search. Pure data, no I/O.
//!
//! The real application additionally lists two pseudo-kinds (scene and
//! group) which are not creatable inputs and are left out here.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputCategory {
    Media,
    Audio,
    Video,
    Text,
    Capture,
    Effect,
}

impl InputCategory {
    /// Localized label shown in the application UI.
    pub fn label(&self) -> &'static str {
        match self {
            InputCategory::Media => "媒体",
            InputCategory::Audio => "音频",
            InputCategory::Video => "视频",
            InputCategory::Text => "文本",
            InputCategory::Capture => "采集",
            InputCategory::Effect => "效果",
        }
    }

    pub const ALL: [InputCategory; 6] = [
        InputCategory::Media,
        InputCategory::Audio,
        InputCategory::Video,
        InputCategory::Text,
        InputCategory::Capture,
        InputCategory::Effect,
    ];
}

/// (internal id, display name, category)
const INPUT_KIND_TABLE: &[(&str, &str, InputCategory)] = &[
    // media
    ("image_source", "图像", InputCategory::Media),
    ("slideshow_v2", "图像幻灯片放映", InputCategory::Media),
    ("ffmpeg_source", "媒体源", InputCategory::Media),
    ("browser_source", "浏览器", InputCategory::Media),
    // text
    ("text_gdiplus_v3", "文本(GDI+)", InputCategory::Text),
    ("text_ft2_source_v2", "文本(FreeType 2)", InputCategory::Text),
    // capture
    ("monitor_capture", "显示器采集", InputCategory::Capture),
    ("window_capture", "窗口采集", InputCategory::Capture),
    ("game_capture", "游戏采集", InputCategory::Capture),
    ("dshow_input", "视频采集设备", InputCategory::Video),
    // audio
    ("wasapi_input_capture", "音频输入采集", InputCategory::Audio),
    ("wasapi_output_capture", "音频输出采集", InputCategory::Audio),
    (
        "wasapi_process_output_capture",
        "应用程序音频采集(测试)",
        InputCategory::Audio,
    ),
    // effect
    ("color_source_v3", "色源", InputCategory::Effect),
];

/// Display name for an input kind; unknown kinds pass through.
pub fn to_chinese(english_type: &str) -> &str {
    INPUT_KIND_TABLE
        .iter()
        .find(|(english, _, _)| *english == english_type)
        .map(|(_, chinese, _)| *chinese)
        .unwrap_or(english_type)
}

/// Internal id for a display name; unknown names pass through.
pub fn to_english(chinese_name: &str) -> &str {
    INPUT_KIND_TABLE
        .iter()
        .find(|(_, chinese, _)| *chinese == chinese_name)
        .map(|(english, _, _)| *english)
        .unwrap_or(chinese_name)
}

pub fn category(english_type: &str) -> Option<InputCategory> {
    INPUT_KIND_TABLE
        .iter()
        .find(|(english, _, _)| *english == english_type)
        .map(|(_, _, category)| *category)
}

/// Localized category label, "未分类" for unknown kinds.
pub fn category_name(english_type: &str) -> &'static str {
    category(english_type)
        .map(|c| c.label())
        .unwrap_or("未分类")
}

pub fn types_in_category(wanted: InputCategory) -> Vec<&'static str> {
    INPUT_KIND_TABLE
        .iter()
        .filter(|(_, _, category)| *category == wanted)
        .map(|(english, _, _)| *english)
        .collect()
}

pub fn is_valid_type(english_type: &str) -> bool {
    INPUT_KIND_TABLE
        .iter()
        .any(|(english, _, _)| *english == english_type)
}

/// All internal id -> display name pairs.
pub fn all_mappings() -> HashMap<&'static str, &'static str> {
    INPUT_KIND_TABLE
        .iter()
        .map(|(english, chinese, _)| (*english, *chinese))
        .collect()
}

/// Internal id -> (display name, category label).
pub fn mappings_with_category() -> HashMap<&'static str, (&'static str, &'static str)> {
    INPUT_KIND_TABLE
        .iter()
        .map(|(english, chinese, category)| (*english, (*chinese, category.label())))
        .collect()
}

/// Case-insensitive keyword search over display names
/// (`search_chinese`) or internal ids; returns (id, display name)
/// pairs in table order.
pub fn search_by_keyword(keyword: &str, search_chinese: bool) -> Vec<(&'static str, &'static str)> {
    let keyword = keyword.to_lowercase();
    INPUT_KIND_TABLE
        .iter()
        .filter(|(english, chinese, _)| {
            if search_chinese {
                chinese.to_lowercase().contains(&keyword)
            } else {
                english.to_lowercase().contains(&keyword)
            }
        })
        .map(|(english, chinese, _)| (*english, *chinese))
        .collect()
}

/// Human-readable table of every kind, grouped by category.
pub fn formatted_list() -> String {
    let mut lines = vec!["输入类型对照表:".to_string(), "=".repeat(50)];
    for category in InputCategory::ALL {
        let kinds = types_in_category(category);
        if kinds.is_empty() {
            continue;
        }
        lines.push(format!("\n【{}】", category.label()));
        for english in kinds {
            lines.push(format!("  {:<30} -> {}", english, to_chinese(english)));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_is_bidirectional() {
        assert_eq!(to_chinese("image_source"), "图像");
        assert_eq!(to_english("图像"), "image_source");
        assert_eq!(to_chinese("wasapi_input_capture"), "音频输入采集");
        assert_eq!(to_english("音频输入采集"), "wasapi_input_capture");
    }

    #[test]
    fn unknown_names_pass_through() {
        assert_eq!(to_chinese("vlc_source"), "vlc_source");
        assert_eq!(to_english("不存在的类型"), "不存在的类型");
        assert_eq!(category_name("vlc_source"), "未分类");
        assert!(!is_valid_type("vlc_source"));
    }

    #[test]
    fn categories_partition_the_table() {
        assert_eq!(category("game_capture"), Some(InputCategory::Capture));
        assert_eq!(category("dshow_input"), Some(InputCategory::Video));

        let counted: usize = InputCategory::ALL
            .iter()
            .map(|c| types_in_category(*c).len())
            .sum();
        assert_eq!(counted, all_mappings().len());
    }

    #[test]
    fn keyword_search_matches_either_side() {
        let hits = search_by_keyword("采集", true);
        assert!(hits.iter().any(|(english, _)| *english == "window_capture"));
        assert!(hits
            .iter()
            .any(|(english, _)| *english == "wasapi_output_capture"));

        let hits = search_by_keyword("WASAPI", false);
        assert_eq!(hits.len(), 3);

        assert!(search_by_keyword("nonexistent", false).is_empty());
    }

    #[test]
    fn formatted_list_names_every_category_in_use() {
        let listing = formatted_list();
        for category in InputCategory::ALL {
            assert!(listing.contains(category.label()));
        }
        assert!(listing.contains("image_source"));
    }
}
