use crate::api::types::{Balance, FlexStatus};
use crate::ui::renderfns::{format_amount, truncate};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

pub fn draw_wallet(
  frame: &mut Frame,
  area: Rect,
  wallet: Option<&str>,
  flex: Option<&FlexStatus>,
  balance: Option<&Balance>,
) {
  let block = Block::default()
    .title(" Wallet ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  let Some(wallet) = wallet else {
    let paragraph = Paragraph::new("No wallet connected. Set user.wallet in the config to enable flex sync.")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  };

  let label = |text: &str| Span::styled(format!("{:<12}", text), Style::default().fg(Color::DarkGray));
  let mut lines = vec![Line::from(vec![label("Address"), Span::raw(truncate(wallet, 48))])];

  if let Some(balance) = balance {
    lines.push(Line::from(vec![
      label("WINIX"),
      Span::styled(format_amount(balance.winix), Style::default().fg(Color::Cyan)),
    ]));
  }

  match flex {
    Some(flex) => {
      lines.push(Line::from(vec![label("Flex"), Span::raw(format_amount(flex.flex_balance))]));
      lines.push(Line::from(vec![
        label("Level"),
        Span::styled(flex.level.clone(), Style::default().fg(Color::Yellow).bold()),
      ]));
      if flex.rewards_available {
        lines.push(Line::from(Span::styled(
          "Flex rewards available",
          Style::default().fg(Color::Green),
        )));
      }
    }
    None => lines.push(Line::from(Span::styled(
      "Flex status not synced yet.",
      Style::default().fg(Color::DarkGray),
    ))),
  }

  frame.render_widget(Paragraph::new(lines).block(block), area);
}
