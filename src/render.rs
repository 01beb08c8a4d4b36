//! 输出模板模块
//!
//! 将 URL 列表渲染为目标文本格式。纯函数，无副作用，不会失败。

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// `![](url) `，末尾空格避免连续粘贴时与后续字符粘连
    Markdown,
    /// `<img src="url" />`
    Html,
    /// 裸 URL
    Url,
}

impl OutputFormat {
    /// 解析格式名（忽略大小写与首尾空白），未识别的格式回退为裸 URL
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "markdown" => Self::Markdown,
            "html" => Self::Html,
            _ => Self::Url,
        }
    }

    fn render_one(self, url: &str) -> String {
        match self {
            Self::Markdown => format!("![]({url}) "),
            Self::Html => format!("<img src=\"{url}\" />"),
            Self::Url => url.to_string(),
        }
    }
}

/// 按格式渲染 URL 列表，每行一个
///
/// # 示例
/// ```rust
/// use picgo::render::render;
///
/// assert_eq!(render("markdown", &["https://a/1.png".to_string()]), "![](https://a/1.png) ");
/// assert_eq!(render("whatever", &["https://a/1.png".to_string()]), "https://a/1.png");
/// assert_eq!(render("html", &[]), "");
/// ```
pub fn render(format: &str, urls: &[String]) -> String {
    let format = OutputFormat::parse(format);
    urls.iter()
        .map(|url| format.render_one(url))
        .collect::<Vec<_>>()
        .join("\n")
}
