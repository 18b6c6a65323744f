use std::collections::HashSet;

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};

use pve_vdi::Resource;
use pve_vdi::resource::{STATUS_RUNNING, STATUS_STOPPED};

pub fn format_status(status: &str) -> String {
    match status {
        STATUS_RUNNING => "\u{25cf} running".to_string(),
        STATUS_STOPPED => "\u{25cb} stopped".to_string(),
        "" => "\u{25cb} unknown".to_string(),
        other => format!("\u{25d0} {}", other),
    }
}

pub fn status_style(status: &str) -> Style {
    match status {
        STATUS_RUNNING => Style::default().fg(Color::Green).bold(),
        STATUS_STOPPED | "" => Style::default().fg(Color::DarkGray),
        _ => Style::default().fg(Color::Yellow),
    }
}

/// `1d 02:03:04`, `02:03:04`, or `-` for a guest that is not up.
pub fn format_uptime(seconds: u64) -> String {
    if seconds == 0 {
        return "-".to_string();
    }
    let days = seconds / 86_400;
    let (h, m, s) = (seconds / 3600 % 24, seconds / 60 % 60, seconds % 60);
    if days > 0 {
        format!("{}d {:02}:{:02}:{:02}", days, h, m, s)
    } else {
        format!("{:02}:{:02}:{:02}", h, m, s)
    }
}

#[allow(clippy::too_many_arguments)]
pub fn draw(
    frame: &mut Frame,
    host: &str,
    vms: &[Resource],
    table_state: &mut TableState,
    pending: &HashSet<u32>,
    refresh_error: Option<&str>,
    status_message: Option<&str>,
    last_refresh: Option<chrono::DateTime<chrono::Local>>,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    // Title (left side): pve-vdi host, (right side): guest counts
    let title = Line::from(vec![
        Span::styled(" pve-vdi ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(host, Style::default().fg(Color::White)),
    ]);
    let running = vms.iter().filter(|vm| vm.is_running()).count();
    let stats_text = Line::from(vec![
        Span::styled("VMs ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            format!("{}", running),
            Style::default().fg(Color::Green).bold(),
        ),
        Span::styled(
            format!("/{} running ", vms.len()),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let title_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    frame.render_widget(title_block.clone(), chunks[0]);
    let title_inner = title_block.inner(chunks[0]);
    let title_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(24)])
        .split(title_inner);
    frame.render_widget(Paragraph::new(title), title_chunks[0]);
    frame.render_widget(
        Paragraph::new(stats_text).alignment(Alignment::Right),
        title_chunks[1],
    );

    // VM Table
    let header = Row::new(vec![
        Cell::from("VMID").style(Style::default().fg(Color::Cyan)),
        Cell::from("NAME").style(Style::default().fg(Color::Cyan)),
        Cell::from("NODE").style(Style::default().fg(Color::Cyan)),
        Cell::from("STATUS").style(Style::default().fg(Color::Cyan)),
        Cell::from("UPTIME").style(Style::default().fg(Color::Cyan)),
    ])
    .style(Style::default().bold())
    .bottom_margin(1);

    let selected_idx = table_state.selected();
    let rows: Vec<Row> = vms
        .iter()
        .enumerate()
        .map(|(idx, vm)| {
            let is_selected = selected_idx == Some(idx);
            let bg = if is_selected {
                Color::Indexed(236)
            } else {
                Color::Reset
            };
            let fg = if is_selected {
                Color::White
            } else {
                Color::Reset
            };

            let status = if pending.contains(&vm.vmid) {
                Span::styled(
                    "\u{25d0} busy",
                    Style::default().fg(Color::Yellow).bg(bg),
                )
            } else {
                Span::styled(format_status(&vm.status), status_style(&vm.status).bg(bg))
            };

            Row::new(vec![
                Cell::from(Span::styled(
                    vm.vmid.to_string(),
                    Style::default().fg(Color::DarkGray).bg(bg),
                )),
                Cell::from(Span::styled(
                    if vm.name.is_empty() {
                        "-".to_string()
                    } else {
                        vm.name.clone()
                    },
                    Style::default().fg(fg).bg(bg),
                )),
                Cell::from(Span::styled(
                    vm.node.clone(),
                    Style::default().fg(fg).bg(bg),
                )),
                Cell::from(status),
                Cell::from(Span::styled(
                    format_uptime(vm.uptime_seconds),
                    Style::default().fg(fg).bg(bg),
                )),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Min(15),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(13),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    )
    .row_highlight_style(Style::default().bg(Color::Indexed(236)));

    frame.render_stateful_widget(table, chunks[1], table_state);

    // Hotkey legend with refresh time
    let legend_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(12)])
        .split(chunks[2]);

    let legend = Line::from(vec![
        Span::styled(" \u{21b5}", Style::default().fg(Color::White).bold()),
        Span::styled(" Console ", Style::default().fg(Color::DarkGray)),
        Span::styled("s", Style::default().fg(Color::Green).bold()),
        Span::styled(" Start/Stop ", Style::default().fg(Color::DarkGray)),
        Span::styled("r", Style::default().fg(Color::Red).bold()),
        Span::styled(" Reset ", Style::default().fg(Color::DarkGray)),
        Span::styled("R", Style::default().fg(Color::Cyan).bold()),
        Span::styled(" Refresh ", Style::default().fg(Color::DarkGray)),
        Span::styled("q", Style::default().fg(Color::Magenta).bold()),
        Span::styled(" Quit", Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(legend), legend_chunks[0]);

    let refresh_time = last_refresh
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());
    let refresh_text = Line::from(vec![Span::styled(
        format!("{} ", refresh_time),
        Style::default().fg(Color::DarkGray),
    )]);
    frame.render_widget(
        Paragraph::new(refresh_text).alignment(Alignment::Right),
        legend_chunks[1],
    );

    // Status bar: refresh errors win over operation messages
    if let Some(error) = refresh_error {
        let error_line = Line::from(vec![
            Span::styled(" \u{26a0} ", Style::default().fg(Color::Red)),
            Span::styled(error, Style::default().fg(Color::Red)),
        ]);
        frame.render_widget(Paragraph::new(error_line), chunks[3]);
    } else if let Some(status) = status_message {
        let status_line = Line::from(vec![Span::styled(
            format!(" {}", status),
            Style::default().fg(Color::Yellow),
        )]);
        frame.render_widget(Paragraph::new(status_line), chunks[3]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(0), "-");
        assert_eq!(format_uptime(59), "00:00:59");
        assert_eq!(format_uptime(3 * 3600 + 25 * 60 + 7), "03:25:07");
        assert_eq!(format_uptime(2 * 86_400 + 3600), "2d 01:00:00");
    }

    #[test]
    fn test_format_status() {
        assert_eq!(format_status("running"), "\u{25cf} running");
        assert_eq!(format_status("stopped"), "\u{25cb} stopped");
        assert_eq!(format_status("paused"), "\u{25d0} paused");
        assert_eq!(format_status(""), "\u{25cb} unknown");
    }
}
