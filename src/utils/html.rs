// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use scraper::{ElementRef, Html, Node};

/// 不计入可见文本的标签
const INVISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// 提取文档的可见文本
///
/// 跳过脚本、样式等不可见节点，文本片段之间以空格连接并压缩空白。
pub fn visible_text(document: &Html) -> String {
    element_visible_text(document.root_element())
}

/// 提取元素内的可见文本
pub fn element_visible_text(element: ElementRef<'_>) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in element.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| match ancestor.value() {
            Node::Element(el) => INVISIBLE_TAGS.contains(&el.name()),
            _ => false,
        });
        if !hidden {
            parts.push(text);
        }
    }
    collapse_whitespace(&parts.join(" "))
}

/// 把连续空白压缩为单个空格并去掉首尾空白
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
