use std::io::Write;

use owo_colors::OwoColorize;
use stitch_core::{ClothesItem, FeedItem};
use stitch_pipeline::{ReviewTask, TaskStatus};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

pub fn print_feeds(w: &mut dyn Write, items: &[FeedItem], color: ColorMode) -> std::io::Result<()> {
    for item in items {
        let likes = format!("{} likes, {} comments", item.like_count, item.comment_count);
        if color.enabled() {
            writeln!(
                w,
                "#{} {} {}",
                item.feed_id,
                item.author_nickname.bold(),
                likes.dimmed()
            )?;
        } else {
            writeln!(w, "#{} {} ({})", item.feed_id, item.author_nickname, likes)?;
        }
        if let Some(content) = &item.content {
            writeln!(w, "    {content}")?;
        }
    }
    writeln!(w, "{} feeds", items.len())?;
    Ok(())
}

pub fn print_clothes(
    w: &mut dyn Write,
    items: &[ClothesItem],
    color: ColorMode,
) -> std::io::Result<()> {
    for item in items {
        let category = item.category.as_str();
        if color.enabled() {
            writeln!(
                w,
                "#{} {} {}",
                item.clothes_id,
                item.product_name.bold(),
                category.dimmed()
            )?;
        } else {
            writeln!(w, "#{} {} [{}]", item.clothes_id, item.product_name, category)?;
        }
    }
    writeln!(w, "{} items", items.len())?;
    Ok(())
}

pub fn print_review(
    w: &mut dyn Write,
    tasks: &[ReviewTask],
    color: ColorMode,
) -> std::io::Result<()> {
    for task in tasks {
        let status = match task.status {
            TaskStatus::Completed => {
                if color.enabled() {
                    format!("{}", "COMPLETED".green())
                } else {
                    "COMPLETED".to_string()
                }
            }
            TaskStatus::Failed => {
                if color.enabled() {
                    format!("{}", "FAILED".red())
                } else {
                    "FAILED".to_string()
                }
            }
            TaskStatus::Preprocessing | TaskStatus::Analyzing => "PENDING".to_string(),
        };
        let category = task
            .form
            .category
            .map(|c| c.as_str())
            .unwrap_or("no category");
        writeln!(w, "{} -> {} ({})", task.task_id, status, category)?;
        if !task.form.materials.is_empty() {
            writeln!(w, "    materials: {}", task.form.materials.join(", "))?;
        }
        if !task.form.colors.is_empty() {
            writeln!(w, "    colors: {}", task.form.colors.join(", "))?;
        }
        if !task.form.style_tags.is_empty() {
            writeln!(w, "    tags: {}", task.form.style_tags.join(" "))?;
        }
    }
    Ok(())
}
