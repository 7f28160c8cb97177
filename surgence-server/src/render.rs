//! 终端页面渲染

use chrono::{DateTime, FixedOffset, Utc};
use std::fmt::Write;
use surgence_client::{ChatMessage, Sender};
use surgence_core::utils::truncate;
use surgence_core::{Patient, PatientPage, Session, StatusDefinition};
use surgence_workflow::{
    display_status, BoardSnapshot, CapabilitySet, DashboardHeader, DashboardSnapshot, Snapshot,
};

fn local_time(time: DateTime<Utc>, tz: &FixedOffset) -> String {
    time.with_timezone(tz).format("%a %b %-d, %H:%M").to_string()
}

/// 首页：会话与导航
pub fn render_home(session: &Session, caps: &CapabilitySet) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Surgence  [{}]", caps.badge());
    let _ = writeln!(out, "Signed in as {}", session.display_name());
    let _ = writeln!(out);
    for item in caps.nav_items() {
        let _ = writeln!(out, "  {:<14} {}", item.label, item.href);
    }
    out
}

/// 状态看板
pub fn render_board(snapshot: &Snapshot<BoardSnapshot>, tz: &FixedOffset) -> String {
    let mut out = String::new();

    let Some(board) = &snapshot.data else {
        match &snapshot.error {
            Some(error) => {
                let _ = writeln!(out, "Unable to load the status board: {}", error);
            }
            None => out.push_str("Loading status board...\n"),
        }
        return out;
    };

    let heading = if board.is_today(tz) {
        "Today's Surgeries".to_string()
    } else {
        format!("Surgeries on {}", board.date.format("%A, %B %-d, %Y"))
    };
    let _ = writeln!(out, "{}", heading);
    if let Some(fetched_at) = snapshot.fetched_at {
        let _ = writeln!(out, "Last updated {}", fetched_at.with_timezone(tz).format("%H:%M:%S"));
    }
    if let Some(error) = &snapshot.error {
        let _ = writeln!(out, "! Refresh failed, showing previous data: {}", error);
    }
    let _ = writeln!(out);

    if board.entries.is_empty() {
        out.push_str("No surgeries scheduled.\n");
        return out;
    }

    for entry in &board.entries {
        let time = entry
            .scheduled_time
            .map(|t| t.with_timezone(tz).format("%H:%M").to_string())
            .unwrap_or_else(|| "--:--".to_string());
        let name = entry
            .identity
            .as_ref()
            .map(|i| format!(" {}", i.name))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{}{:<20} {}  {} {:<14} {}",
            entry.ordinal,
            name,
            time,
            entry.status.icon.glyph(),
            entry.status.label,
            entry.status.message
        );
    }
    out
}

/// 患者分页列表
pub fn render_patient_page(page: &PatientPage, tz: &FixedOffset) -> String {
    let mut out = String::new();
    if page.items.is_empty() {
        out.push_str("No patients found.\n");
        return out;
    }

    for patient in &page.items {
        let scheduled = patient
            .scheduled_time
            .map(|t| local_time(t, tz))
            .unwrap_or_else(|| "N/A".to_string());
        let _ = writeln!(
            out,
            "{:<16} {:<24} {:<22} {}",
            patient.patient_number,
            truncate(&patient.full_name(), 24),
            scheduled,
            display_status(&patient.status).label
        );
    }
    let _ = writeln!(
        out,
        "\nPage {} of {} ({} patients)",
        page.page,
        page.pages.max(1),
        page.total
    );
    out
}

/// 搜索结果
pub fn render_patients(patients: &[Patient], tz: &FixedOffset) -> String {
    if patients.is_empty() {
        return "No patients match your search criteria.\n".to_string();
    }
    let mut out = String::new();
    for patient in patients {
        let _ = writeln!(
            out,
            "{:<16} {:<24} {:<22} {:<16} {}",
            patient.patient_number,
            truncate(&patient.full_name(), 24),
            local_time(patient.scheduled_time, tz),
            truncate(&patient.procedure, 16),
            display_status(&patient.status).label
        );
    }
    out
}

/// 患者详情
pub fn render_patient(patient: &Patient, tz: &FixedOffset) -> String {
    let status = display_status(&patient.status);
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", patient.full_name(), patient.patient_number);
    let _ = writeln!(out, "Status     {} {} - {}", status.icon.glyph(), status.label, status.message);
    let _ = writeln!(out, "Procedure  {}", patient.procedure);
    let _ = writeln!(out, "Scheduled  {}", local_time(patient.scheduled_time, tz));
    let _ = writeln!(out, "Surgeon    {}", patient.surgeon_name.as_deref().unwrap_or("N/A"));
    let _ = writeln!(out, "Room       {}", patient.room_no.as_deref().unwrap_or("N/A"));
    let _ = writeln!(out, "Phone      {}", patient.phone);
    let _ = writeln!(out, "Email      {}", patient.email);
    let _ = writeln!(
        out,
        "Address    {}, {}, {}, {}",
        patient.address, patient.city, patient.state, patient.country
    );
    if let Some(note) = patient.note.as_deref().filter(|n| !n.is_empty()) {
        let _ = writeln!(out, "Note       {}", note);
    }
    let _ = writeln!(
        out,
        "Created {} / Updated {}",
        local_time(patient.created_at, tz),
        local_time(patient.updated_at, tz)
    );
    out
}

/// 仪表盘
pub fn render_dashboard(header: &DashboardHeader, snapshot: &DashboardSnapshot, tz: &FixedOffset) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}\n{}\n", header.title, header.description);

    if let Some(stats) = &snapshot.overview {
        let _ = writeln!(out, "New patients         {}", stats.new_patients);
        let _ = writeln!(
            out,
            "Surgeries            {} total, {} completed, {} remaining",
            stats.surgeries_total, stats.surgeries_completed, stats.surgeries_remaining
        );
        let _ = writeln!(out, "Average wait         {:.1} min", stats.avg_wait_time_minutes);
        let _ = writeln!(out, "Active cases         {}\n", stats.active_cases);
    }

    if let Some(rows) = &snapshot.breakdown {
        out.push_str("Status breakdown\n");
        for row in rows {
            let _ = writeln!(out, "  {} {:<16} {}", row.display.icon.glyph(), row.display.label, row.count);
        }
        out.push('\n');
    }

    if let Some(activity) = &snapshot.activity {
        out.push_str("Recent activity\n");
        if activity.status_changes.is_empty() {
            out.push_str("  No status changes today.\n");
        }
        for change in &activity.status_changes {
            let _ = writeln!(
                out,
                "  {} {} ({}): {} -> {}",
                change.changed_at.with_timezone(tz).format("%H:%M"),
                change.name,
                change.patient_number,
                change.previous_status.as_deref().unwrap_or("-"),
                change.new_status
            );
        }
        let _ = writeln!(
            out,
            "  {} completed today, {} active",
            activity.completed_today.len(),
            activity.active_cases.len()
        );
    }

    for error in &snapshot.errors {
        let _ = writeln!(out, "! {}", error);
    }
    out
}

/// 后端状态字典
pub fn render_statuses(statuses: &[StatusDefinition]) -> String {
    let mut out = String::new();
    for definition in statuses {
        let display = display_status(&definition.status);
        let _ = writeln!(
            out,
            "{:>2}. {} {:<14} {}",
            definition.order_index,
            display.icon.glyph(),
            definition.status,
            definition.message
        );
    }
    out
}

pub fn render_chat_message(message: &ChatMessage) -> String {
    match (message.sender, message.is_error) {
        (Sender::User, _) => format!("you> {}", message.text),
        (Sender::Bot, false) => format!("bot> {}", message.text),
        (Sender::Bot, true) => format!("bot! {}", message.text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use surgence_core::{PatientSummary, Role};
    use surgence_workflow::board::project;
    use surgence_workflow::fixtures::FixtureBuilder;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn board_snapshot(role: Role) -> Snapshot<BoardSnapshot> {
        let date = NaiveDate::from_ymd_opt(2025, 8, 1).unwrap();
        let summaries = FixtureBuilder::new(4).day(date, 3).build();
        Snapshot {
            token: 1,
            data: Some(BoardSnapshot {
                date,
                entries: project(&summaries, date, &utc(), &CapabilitySet::for_role(role)),
            }),
            error: None,
            fetched_at: None,
        }
    }

    #[test]
    fn test_guest_board_shows_ordinals_only() {
        let text = render_board(&board_snapshot(Role::Guest), &utc());
        assert!(text.starts_with("Surgeries on Friday, August 1, 2025"));
        assert!(text.contains("P001"));
        assert!(text.contains("P003"));
        assert!(text.contains("07:00"));
    }

    #[test]
    fn test_board_error_keeps_previous_data() {
        let mut snapshot = board_snapshot(Role::Admin);
        snapshot.error = Some("timeout".to_string());
        let text = render_board(&snapshot, &utc());
        assert!(text.contains("Refresh failed"));
        assert!(text.contains("P002"));
    }

    #[test]
    fn test_home_lists_permitted_pages() {
        let caps = CapabilitySet::for_role(Role::Guest);
        let text = render_home(&Session::guest(), &caps);
        assert!(text.contains("Guest User"));
        assert!(text.contains("/status-board"));
        assert!(!text.contains("/add-patient"));
    }

    #[test]
    fn test_patient_page_footer() {
        let page = PatientPage {
            items: vec![PatientSummary {
                patient_number: "P20250801-001".to_string(),
                first_name: "Mary".to_string(),
                last_name: "Chen".to_string(),
                status: "Closing".to_string(),
                email: None,
                phone: None,
                room_no: None,
                procedure: None,
                scheduled_time: None,
                surgeon_name: None,
            }],
            total: 21,
            page: 2,
            pages: 3,
        };
        let text = render_patient_page(&page, &utc());
        assert!(text.contains("Mary Chen"));
        assert!(text.contains("Page 2 of 3 (21 patients)"));
    }
}
