use crate::api::types::Task;
use crate::ui::renderfns::{format_amount, task_status_color, truncate};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

pub fn draw_task_list(frame: &mut Frame, area: Rect, tasks: &[Task], selected: usize) {
  let completed = tasks.iter().filter(|t| t.is_completed()).count();
  let block = Block::default()
    .title(format!(" Tasks ({}/{}) ", completed, tasks.len()))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if tasks.is_empty() {
    let paragraph = Paragraph::new("No tasks loaded yet. Press r to sync.")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let items: Vec<ListItem> = tasks
    .iter()
    .map(|task| {
      let line = Line::from(vec![
        Span::styled(
          format!("{:<12}", truncate(&task.status, 12)),
          Style::default().fg(task_status_color(&task.status)),
        ),
        Span::styled(
          format!("{:>3}/{:<3}", task.progress, task.target),
          Style::default().fg(Color::DarkGray),
        ),
        Span::raw(" "),
        Span::styled(
          format!("+{:<8}", format_amount(task.reward)),
          Style::default().fg(Color::Cyan),
        ),
        Span::raw(truncate(&task.title, 60)),
      ]);
      ListItem::new(line)
    })
    .collect();

  let list = List::new(items)
    .block(block)
    .highlight_style(
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

  let mut state = ListState::default();
  state.select(Some(selected));

  frame.render_stateful_widget(list, area, &mut state);
}
