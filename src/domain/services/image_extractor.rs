// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use html5ever::driver::{self, ParseOpts};
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use scraper::{ElementRef, Html, HtmlTreeSink, Selector};
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::Url;

use crate::domain::models::image_detail::RawImageRef;
use crate::utils::url_utils;

static IMG_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("static selector"));
static BASE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("base[href]").expect("static selector"));

/// 图片提取服务
///
/// 以宽松模式解析 HTML，收集每个 `<img>` 元素的地址、alt 属性和声明尺寸。
/// 无法解析的节点被跳过，不会中断整体提取。
#[derive(Debug, Clone)]
pub struct ImageExtractor {
    max_images: usize,
}

impl Default for ImageExtractor {
    fn default() -> Self {
        Self { max_images: 1000 }
    }
}

impl ImageExtractor {
    pub fn new(max_images: usize) -> Self {
        Self { max_images }
    }

    /// 提取图片引用
    ///
    /// # 参数
    ///
    /// * `html` - 页面 HTML
    /// * `base_url` - 重定向后的最终 URL，用于解析相对地址
    ///
    /// # 返回值
    ///
    /// 按文档顺序排列的图片引用；同一地址的多次出现分别计数
    pub fn extract(&self, html: &str, base_url: &Url) -> Vec<RawImageRef> {
        let document = parse_static_document(html);
        let base = document_base(&document, base_url);

        let mut images = Vec::new();
        let mut skipped = 0usize;

        for element in document.select(&IMG_SELECTOR) {
            if images.len() >= self.max_images {
                warn!(
                    max_images = self.max_images,
                    "Image cap reached, remaining <img> elements ignored"
                );
                break;
            }

            match image_ref(element, &base, images.len() as u32) {
                Some(image) => images.push(image),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            debug!(skipped, "Skipped <img> elements without a resolvable source");
        }

        images
    }
}

/// 以关闭脚本的模式解析文档，`<noscript>` 中的内容按普通标记处理
fn parse_static_document(html: &str) -> Html {
    let opts = ParseOpts {
        tree_builder: TreeBuilderOpts {
            scripting_enabled: false,
            ..Default::default()
        },
        ..Default::default()
    };
    driver::parse_document(HtmlTreeSink::new(Html::new_document()), opts).one(html)
}

/// 文档中 `<base href>` 指定的基础地址，仅接受 http(s)
fn document_base(document: &Html, fallback: &Url) -> Url {
    document
        .select(&BASE_SELECTOR)
        .next()
        .and_then(|base| base.value().attr("href"))
        .and_then(|href| url_utils::resolve_url(fallback, href.trim()).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or_else(|| fallback.clone())
}

fn image_ref(element: ElementRef<'_>, base: &Url, position: u32) -> Option<RawImageRef> {
    let attrs = element.value();

    let source = attrs
        .attr("src")
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .or_else(|| attrs.attr("srcset").and_then(first_srcset_candidate))?;

    let image_url = url_utils::resolve_url(base, source).ok()?;

    Some(RawImageRef {
        position,
        image_url: image_url.to_string(),
        alt_text: attrs.attr("alt").map(str::to_string),
        width: attrs.attr("width").and_then(parse_dimension),
        height: attrs.attr("height").and_then(parse_dimension),
    })
}

/// `srcset` 中第一个候选的地址部分
///
/// 地址延伸到下一个空白为止，只去掉末尾的逗号，地址内部的逗号保留
fn first_srcset_candidate(srcset: &str) -> Option<&str> {
    let rest = srcset.trim_start_matches(|c: char| c.is_ascii_whitespace() || c == ',');
    let end = rest
        .find(|c: char| c.is_ascii_whitespace())
        .unwrap_or(rest.len());
    let url = rest[..end].trim_end_matches(',');
    (!url.is_empty()).then_some(url)
}

/// 解析声明的尺寸，接受 `300`、` 300 `、`300px`
fn parse_dimension(value: &str) -> Option<u32> {
    let value = value.trim();
    let value = value.strip_suffix("px").unwrap_or(value).trim_end();
    value.parse().ok()
}
