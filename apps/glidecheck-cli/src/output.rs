use futures::{stream::BoxStream, StreamExt};
use glidecheck_types::{
    events::{EventPayload, PipelineEvent},
    report::AnnotationRun,
    vision::GearChecklist,
};

/// Prints progress and frame failures until the bus closes.
pub async fn print_events(mut events: BoxStream<'static, PipelineEvent>) {
    while let Some(event) = events.next().await {
        let timestamp = event.timestamp.format("%H:%M:%S");
        match &event.payload {
            EventPayload::Progress(p) => {
                eprintln!("[{timestamp}] analyzing frames {:>3.0}%", p.fraction * 100.0)
            }
            EventPayload::FrameFailed(failure) => eprintln!(
                "[{timestamp}] Error analyzing frame {} ({}): {}",
                failure.index + 1,
                failure.stage,
                failure.message
            ),
            EventPayload::Lifecycle(lifecycle) => eprintln!(
                "[{timestamp}] {:?} {}",
                lifecycle.phase,
                lifecycle.details.clone().unwrap_or_default()
            ),
            EventPayload::Checklist(_) | EventPayload::Narration(_) => {}
        }
    }
}

pub fn print_checklist(checklist: &GearChecklist) {
    println!("Safety Gear Checklist");
    for entry in &checklist.entries {
        if entry.detected {
            println!("  ✅ {} detected", capitalize(&entry.item));
        } else {
            println!("  ❌ {} not detected", capitalize(&entry.item));
        }
    }
    println!("{}", checklist_verdict(checklist));
}

fn checklist_verdict(checklist: &GearChecklist) -> String {
    if checklist.all_present() {
        "All safety gear present. Cleared for take-off.".to_string()
    } else {
        let missing: Vec<&str> = checklist.missing().collect();
        format!("Not cleared: missing {}", missing.join(", "))
    }
}

pub fn print_run(run: &AnnotationRun) {
    match &run.output {
        Some(path) => println!(
            "Analyzed video: {} ({}/{} frames annotated, {} ms)",
            path.display(),
            run.annotated_count(),
            run.frame_count,
            run.duration_ms()
        ),
        None => println!("Video contained no frames to analyze"),
    }
    for failure in &run.failures {
        println!("  frame {} left unannotated: {}", failure.index + 1, failure.message);
    }
}

pub fn print_story(story: &str) {
    println!("Your Paragliding Story:\n{story}");
}

fn capitalize(item: &str) -> String {
    let mut chars = item.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
