//! Localized validation messages

use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "zh-CN")]
    ZhCn,
    #[serde(rename = "en")]
    En,
}

impl FromStr for Locale {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zh-CN" | "zh_CN" | "zh" => Ok(Locale::ZhCn),
            "en" | "en-US" | "en_US" => Ok(Locale::En),
            _ => Err(()),
        }
    }
}

impl Locale {
    /// Display name of a request field
    pub fn attribute(self, field: &str) -> String {
        let zh = match field {
            "title" => "标题",
            "total" => "总页数",
            "read" => "已读",
            "started_at" => "开始时间",
            "cover" => "封面",
            "hidden" => "隐藏",
            "deleted_at" => "删除时间",
            "page" => "页数",
            "desc" => "描述",
            "content" => "内容",
            "html_content" => "HTML 内容",
            "tags" => "标签",
            "name" => "名称",
            "username" => "用户名",
            "password" => "密码",
            other => return other.replace('_', " "),
        };
        match self {
            Locale::ZhCn => zh.to_string(),
            Locale::En => field.replace('_', " "),
        }
    }

    pub fn required(self, field: &str) -> String {
        let attr = self.attribute(field);
        match self {
            Locale::ZhCn => format!("{}不能为空", attr),
            Locale::En => format!("The {} field is required.", attr),
        }
    }

    pub fn string(self, field: &str) -> String {
        let attr = self.attribute(field);
        match self {
            Locale::ZhCn => format!("{}必须是字符串", attr),
            Locale::En => format!("The {} must be a string.", attr),
        }
    }

    pub fn max_length(self, field: &str, max: usize) -> String {
        let attr = self.attribute(field);
        match self {
            Locale::ZhCn => format!("{}不能超过{}个字符", attr, max),
            Locale::En => format!("The {} may not be greater than {} characters.", attr, max),
        }
    }

    pub fn integer(self, field: &str) -> String {
        let attr = self.attribute(field);
        match self {
            Locale::ZhCn => format!("{}必须是整数", attr),
            Locale::En => format!("The {} must be an integer.", attr),
        }
    }

    pub fn min_value(self, field: &str, min: i64) -> String {
        let attr = self.attribute(field);
        match self {
            Locale::ZhCn => format!("{}不能小于{}", attr, min),
            Locale::En => format!("The {} must be at least {}.", attr, min),
        }
    }

    pub fn boolean(self, field: &str) -> String {
        let attr = self.attribute(field);
        match self {
            Locale::ZhCn => format!("{}必须是布尔值", attr),
            Locale::En => format!("The {} field must be true or false.", attr),
        }
    }

    pub fn date(self, field: &str) -> String {
        let attr = self.attribute(field);
        match self {
            Locale::ZhCn => format!("{}不是有效的日期", attr),
            Locale::En => format!("The {} is not a valid date.", attr),
        }
    }

    pub fn array(self, field: &str) -> String {
        let attr = self.attribute(field);
        match self {
            Locale::ZhCn => format!("{}数据格式不对", attr),
            Locale::En => format!("The {} must be an array.", attr),
        }
    }

    pub fn read_exceeds_total(self, total: i64) -> String {
        match self {
            Locale::ZhCn => format!("已读不能大于{}", total),
            Locale::En => format!("The read pages may not be greater than {}.", total),
        }
    }

    pub fn total_below_read(self, read: i64) -> String {
        match self {
            Locale::ZhCn => format!("总页数不能小于{}", read),
            Locale::En => format!("The total pages may not be less than {}.", read),
        }
    }

    pub fn page_exceeds_total(self, max: i64) -> String {
        match self {
            Locale::ZhCn => format!("页数不能超过{}页", max),
            Locale::En => format!("The page may not be greater than {}.", max),
        }
    }

    pub fn not_image(self) -> String {
        match self {
            Locale::ZhCn => "封面不是图片不行的".to_string(),
            Locale::En => "The cover must be an image.".to_string(),
        }
    }

    pub fn restore_only(self) -> String {
        match self {
            Locale::ZhCn => "删除时间只能清空".to_string(),
            Locale::En => "The deleted at field may only be cleared.".to_string(),
        }
    }

    pub fn tag_taken(self) -> String {
        match self {
            Locale::ZhCn => "标签已存在".to_string(),
            Locale::En => "The name has already been taken.".to_string(),
        }
    }

    pub fn bad_credentials(self) -> String {
        match self {
            Locale::ZhCn => "用户名或密码错误".to_string(),
            Locale::En => "These credentials do not match our records.".to_string(),
        }
    }
}
