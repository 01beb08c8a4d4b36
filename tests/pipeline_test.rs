mod common;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde_json::json;

use common::{CountingAdapter, Fixture, RecordingSink};
use picgo::adapters::Uploader;
use picgo::clipboard::NoopClipboard;
use picgo::config::HostConfig;
use picgo::error::{AppError, SideEffectError};
use picgo::hooks::{HookBus, Phase};

fn files(names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(|n| PathBuf::from(format!("/pics/{n}"))).collect()
}

#[test]
fn mock_upload_returns_one_url_per_file_in_order() {
    let fx = Fixture::new("pipeline-order");
    let pipeline = fx.pipeline(vec![], Arc::new(NoopClipboard));

    let input = files(&["a.png", "b.jpg", "c.gif"]);
    let text = pipeline.run(&input, Some("mock"), Some("url")).unwrap();

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].ends_with("/a.png"));
    assert!(lines[1].ends_with("/b.jpg"));
    assert!(lines[2].ends_with("/c.gif"));
}

#[test]
fn history_is_appended_once_when_enabled() {
    let fx = Fixture::new("pipeline-history-on");
    let pipeline = fx.pipeline(vec![], Arc::new(NoopClipboard));

    pipeline
        .run(&files(&["a.png", "b.png"]), Some("mock"), None)
        .unwrap();

    let entries = fx.history.list();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].host, "mock");
    assert_eq!(entries[0].urls.len(), 2);
    assert_eq!(entries[0].files, vec!["/pics/a.png".to_string(), "/pics/b.png".to_string()]);
}

#[test]
fn history_is_skipped_when_disabled() {
    let fx = Fixture::new("pipeline-history-off");
    fx.set_global("history_enabled", json!(false));
    let pipeline = fx.pipeline(vec![], Arc::new(NoopClipboard));

    pipeline.run(&files(&["a.png"]), Some("mock"), None).unwrap();

    assert!(fx.history.list().is_empty());
}

#[test]
fn hooks_see_urls_only_after_upload() {
    let fx = Fixture::new("pipeline-hooks");
    let bus = Arc::new(HookBus::new());
    let observed = Arc::new(Mutex::new(Vec::new()));

    for phase in [Phase::Input, Phase::BeforeUpload, Phase::AfterUpload] {
        let observed = Arc::clone(&observed);
        bus.add_hook(phase, move |ctx| {
            observed
                .lock()
                .unwrap()
                .push((phase, ctx.urls.as_ref().map(Vec::len), ctx.output_text.is_some()));
            Ok(ctx)
        })
        .unwrap();
    }

    let pipeline = fx
        .pipeline(vec![], Arc::new(NoopClipboard))
        .with_hooks(Arc::clone(&bus));
    pipeline
        .run(&files(&["a.png", "b.png"]), Some("mock"), None)
        .unwrap();

    assert_eq!(
        *observed.lock().unwrap(),
        vec![
            (Phase::Input, None, false),
            (Phase::BeforeUpload, None, false),
            (Phase::AfterUpload, Some(2), false),
        ]
    );
}

#[test]
fn after_upload_hook_can_rewrite_urls() {
    let fx = Fixture::new("pipeline-rewrite");
    let bus = Arc::new(HookBus::new());
    bus.add_hook(Phase::AfterUpload, |mut ctx| {
        if let Some(urls) = ctx.urls.as_mut() {
            for url in urls.iter_mut() {
                *url = url.replace("https://mock.example.com", "https://cdn.example.com");
            }
        }
        Ok(ctx)
    })
    .unwrap();

    let pipeline = fx
        .pipeline(vec![], Arc::new(NoopClipboard))
        .with_hooks(bus);
    let outcome = pipeline
        .run_detailed(&files(&["a.png"]), Some("mock"), Some("html"))
        .unwrap();

    assert!(outcome.text.starts_with("<img src=\"https://cdn.example.com/"));
    assert!(fx.history.list()[0].urls[0].starts_with("https://cdn.example.com/"));
}

#[test]
fn before_upload_hook_can_redirect_host() {
    let fx = Fixture::new("pipeline-redirect");
    let counting = Arc::new(CountingAdapter::new("counting"));
    let bus = Arc::new(HookBus::new());
    bus.add_hook(Phase::BeforeUpload, |mut ctx| {
        ctx.host = "counting".to_string();
        Ok(ctx)
    })
    .unwrap();

    let pipeline = fx
        .pipeline(vec![counting.clone() as Arc<dyn Uploader>], Arc::new(NoopClipboard))
        .with_hooks(bus);
    let outcome = pipeline
        .run_detailed(&files(&["a.png"]), Some("mock"), Some("url"))
        .unwrap();

    assert_eq!(counting.calls(), 1);
    assert_eq!(outcome.host, "counting");
    assert_eq!(outcome.text, "https://counting.test/0.png");
}

#[test]
fn redirected_host_uses_its_own_config() {
    let fx = Fixture::new("pipeline-redirect-config");
    fx.config
        .set_host_config("mock", HostConfig::new().with("base_url", "https://redirected.test"))
        .unwrap();
    let bus = Arc::new(HookBus::new());
    bus.add_hook(Phase::BeforeUpload, |mut ctx| {
        ctx.host = "mock".to_string();
        Ok(ctx)
    })
    .unwrap();

    let pipeline = fx
        .pipeline(vec![], Arc::new(NoopClipboard))
        .with_hooks(bus);
    let outcome = pipeline
        .run_detailed(&files(&["a.png"]), Some("smms"), Some("url"))
        .unwrap();

    assert_eq!(outcome.host, "mock");
    assert!(outcome.text.starts_with("https://redirected.test/"), "got {}", outcome.text);
    assert_eq!(fx.history.list()[0].host, "mock");
}

#[test]
fn hook_supplied_config_wins_over_stored_config() {
    let fx = Fixture::new("pipeline-hook-config");
    let bus = Arc::new(HookBus::new());
    bus.add_hook(Phase::BeforeUpload, |mut ctx| {
        ctx.host = "mock".to_string();
        ctx.config = HostConfig::new().with("base_url", "https://from-hook.test");
        Ok(ctx)
    })
    .unwrap();

    let pipeline = fx
        .pipeline(vec![], Arc::new(NoopClipboard))
        .with_hooks(bus);
    let text = pipeline
        .run(&files(&["a.png"]), Some("smms"), Some("url"))
        .unwrap();

    assert!(text.starts_with("https://from-hook.test/"), "got {text}");
}

#[test]
fn unknown_host_fails_without_upload_or_history() {
    let fx = Fixture::new("pipeline-unknown-host");
    let pipeline = fx.pipeline(vec![], Arc::new(NoopClipboard));

    let err = pipeline
        .run(&files(&["a.png"]), Some("imgur"), None)
        .expect_err("unknown host must fail");

    assert!(matches!(err, AppError::AdapterNotFound { ref host } if host == "imgur"));
    assert_eq!(err.to_string(), "no adapter registered for host: imgur");
    assert!(fx.history.list().is_empty());
}

#[test]
fn before_upload_hook_error_aborts_before_adapter() {
    let fx = Fixture::new("pipeline-hook-abort");
    let counting = Arc::new(CountingAdapter::new("counting"));
    let sink = Arc::new(RecordingSink::default());
    let bus = Arc::new(HookBus::new());
    bus.add_hook(Phase::BeforeUpload, |_ctx| Err("quota exceeded".into()))
        .unwrap();

    let pipeline = fx
        .pipeline(vec![counting.clone() as Arc<dyn Uploader>], sink.clone())
        .with_hooks(bus);
    let err = pipeline
        .run(&files(&["a.png"]), Some("counting"), None)
        .expect_err("hook error must abort");

    match err {
        AppError::HookFailed { phase, message } => {
            assert_eq!(phase, Phase::BeforeUpload);
            assert_eq!(message, "quota exceeded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(counting.calls(), 0);
    assert!(fx.history.list().is_empty());
    assert!(sink.copied().is_empty());
}

#[test]
fn adapter_failure_propagates_unchanged() {
    let fx = Fixture::new("pipeline-adapter-fail");
    let failing = Arc::new(CountingAdapter::failing("flaky"));
    let pipeline = fx.pipeline(vec![failing.clone() as Arc<dyn Uploader>], Arc::new(NoopClipboard));

    let err = pipeline
        .run(&files(&["a.png"]), Some("flaky"), None)
        .expect_err("adapter failure must propagate");

    assert!(matches!(err, AppError::UploadFailed { status: Some(503), .. }));
    assert_eq!(failing.calls(), 1);
    assert!(fx.history.list().is_empty());
}

#[test]
fn rendered_text_is_copied_to_clipboard() {
    let fx = Fixture::new("pipeline-copy");
    let sink = Arc::new(RecordingSink::default());
    let pipeline = fx.pipeline(vec![], sink.clone());

    let text = pipeline.run(&files(&["a.png"]), Some("mock"), None).unwrap();

    assert!(text.starts_with("![](https://mock.example.com/"));
    assert_eq!(sink.copied(), vec![text]);
}

#[test]
fn copy_is_skipped_when_disabled() {
    let fx = Fixture::new("pipeline-copy-off");
    fx.set_global("copy_to_clipboard", json!(false));
    let sink = Arc::new(RecordingSink::default());
    let pipeline = fx.pipeline(vec![], sink.clone());

    pipeline.run(&files(&["a.png"]), Some("mock"), None).unwrap();

    assert!(sink.copied().is_empty());
}

#[test]
fn clipboard_failure_is_a_side_effect_not_an_error() {
    let fx = Fixture::new("pipeline-copy-fail");
    let pipeline = fx.pipeline(vec![], Arc::new(RecordingSink::failing()));

    let outcome = pipeline
        .run_detailed(&files(&["a.png"]), Some("mock"), Some("url"))
        .expect("upload itself succeeded");

    assert_eq!(outcome.urls.len(), 1);
    assert_eq!(outcome.side_effect_errors.len(), 1);
    assert!(matches!(outcome.side_effect_errors[0], SideEffectError::ClipboardCopy(_)));
    assert_eq!(fx.history.list().len(), 1);
}

#[test]
fn history_failure_is_a_side_effect_and_copy_still_happens() {
    let fx = Fixture::new("pipeline-history-fail");
    // 临时文件位置被目录占用，原子写入必然失败
    std::fs::create_dir_all(fx.path().join("history.json.tmp")).unwrap();
    let sink = Arc::new(RecordingSink::default());
    let pipeline = fx.pipeline(vec![], sink.clone());

    let outcome = pipeline
        .run_detailed(&files(&["a.png"]), Some("mock"), Some("url"))
        .expect("upload itself succeeded");

    assert_eq!(outcome.urls.len(), 1);
    assert_eq!(outcome.side_effect_errors.len(), 1);
    assert!(matches!(outcome.side_effect_errors[0], SideEffectError::History(_)));
    assert_eq!(sink.copied(), vec![outcome.text.clone()]);
    assert!(fx.history.list().is_empty());
}

#[test]
fn missing_config_error_carries_fix_hint() {
    let fx = Fixture::new("pipeline-config-missing");
    let pipeline = fx.pipeline(vec![], Arc::new(NoopClipboard));

    for host in ["github", "smms", "bilibili"] {
        let err = pipeline
            .run(&files(&["a.png"]), Some(host), None)
            .expect_err("empty default config must fail");
        match err {
            AppError::ConfigMissing { host: h, hint, .. } => {
                assert_eq!(h, host);
                assert!(hint.contains(&format!("--host {host}")));
            }
            other => panic!("{host}: unexpected error {other:?}"),
        }
    }
}

#[test]
fn concurrent_runs_each_append_history() {
    let fx = Fixture::new("pipeline-concurrent");
    let pipeline = Arc::new(fx.pipeline(vec![], Arc::new(NoopClipboard)));

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let pipeline = Arc::clone(&pipeline);
            std::thread::spawn(move || {
                let file = PathBuf::from(format!("/pics/{i}.png"));
                pipeline.run(&[file], Some("mock"), Some("url")).unwrap()
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(fx.history.list().len(), 6);
}
