use std::ffi::{c_void, CStr};
use std::sync::Arc;
use std::time::Instant;

use raw_window_handle::{HasWindowHandle, RawWindowHandle};
use vst3::Steinberg::Linux::{
    FileDescriptor, IEventHandler, IRunLoop, IRunLoopTrait, ITimerHandler, TimerInterval,
};
use vst3::Steinberg::Vst::{IEditController, IEditControllerTrait};
use vst3::Steinberg::{
    kInvalidArgument, kResultOk, kResultTrue, tresult, IPlugFrame, IPlugFrameTrait, IPlugView,
    IPlugViewTrait, ViewRect,
};
use vst3::{Class, ComPtr, ComWrapper};
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopBuilder};
use winit::window::{Window, WindowBuilder};

use super::error::{HostError, Result};
use super::run_loop::RunLoop;

#[cfg(windows)]
const PLATFORM_TYPE: &CStr = c"HWND";
#[cfg(target_os = "macos")]
const PLATFORM_TYPE: &CStr = c"NSView";
#[cfg(not(any(windows, target_os = "macos")))]
const PLATFORM_TYPE: &CStr = c"X11EmbedWindowID";

const DEFAULT_SIZE: (u32, u32) = (800, 600);

/// Lets the plugin ask for a new editor size, and on Linux hands it the run
/// loop its timers and X11 descriptors are driven from.
struct PlugFrame {
    window: Arc<Window>,
    run_loop: RunLoop,
}

impl Class for PlugFrame {
    type Interfaces = (IPlugFrame, IRunLoop);
}

impl IPlugFrameTrait for PlugFrame {
    unsafe fn resizeView(&self, _view: *mut IPlugView, new_size: *mut ViewRect) -> tresult {
        if new_size.is_null() {
            return kInvalidArgument;
        }
        let (width, height) = rect_size(&*new_size);
        log::debug!("Plugin requested editor size {width}x{height}");
        let _ = self.window.request_inner_size(PhysicalSize::new(width, height));
        kResultOk
    }
}

impl IRunLoopTrait for PlugFrame {
    unsafe fn registerEventHandler(&self, handler: *mut IEventHandler, fd: FileDescriptor) -> tresult {
        self.run_loop.register_event_handler(handler, fd)
    }

    unsafe fn unregisterEventHandler(&self, handler: *mut IEventHandler) -> tresult {
        self.run_loop.unregister_event_handler(handler)
    }

    unsafe fn registerTimer(&self, handler: *mut ITimerHandler, milliseconds: TimerInterval) -> tresult {
        self.run_loop.register_timer(handler, milliseconds)
    }

    unsafe fn unregisterTimer(&self, handler: *mut ITimerHandler) -> tresult {
        self.run_loop.unregister_timer(handler)
    }
}

fn rect_size(rect: &ViewRect) -> (u32, u32) {
    let width = (rect.right - rect.left).max(0) as u32;
    let height = (rect.bottom - rect.top).max(0) as u32;
    if width == 0 || height == 0 {
        DEFAULT_SIZE
    } else {
        (width, height)
    }
}

fn build_event_loop() -> Result<EventLoop<()>> {
    let mut builder = EventLoopBuilder::new();
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        // Plugins embed into X11 windows only.
        use winit::platform::x11::EventLoopBuilderExtX11;
        builder.with_x11();
    }
    builder
        .build()
        .map_err(|e| HostError::Editor(format!("Failed to create event loop: {e}")))
}

fn parent_handle(window: &Window) -> Result<*mut c_void> {
    let handle = window
        .window_handle()
        .map_err(|e| HostError::Editor(format!("Failed to get raw window handle: {e}")))?;
    match handle.as_raw() {
        RawWindowHandle::Win32(h) => Ok(h.hwnd.get() as *mut c_void),
        RawWindowHandle::AppKit(h) => Ok(h.ns_view.as_ptr()),
        RawWindowHandle::Xlib(h) => Ok(h.window as usize as *mut c_void),
        RawWindowHandle::Xcb(h) => Ok(h.window.get() as usize as *mut c_void),
        other => Err(HostError::Editor(format!(
            "Unsupported window handle for plugin editor: {other:?}"
        ))),
    }
}

/// Opens the controller's editor view in a new window and blocks until the
/// window is closed.
pub fn run_editor(controller: &ComPtr<IEditController>, title: &str) -> Result<()> {
    let view = unsafe { ComPtr::<IPlugView>::from_raw(controller.createView(c"editor".as_ptr())) }
        .ok_or(HostError::NoEditor)?;

    if unsafe { view.isPlatformTypeSupported(PLATFORM_TYPE.as_ptr()) } != kResultOk {
        return Err(HostError::Editor(format!(
            "Editor does not support platform type {}",
            PLATFORM_TYPE.to_string_lossy()
        )));
    }

    let mut rect: ViewRect = unsafe { std::mem::zeroed() };
    let (width, height) = if unsafe { view.getSize(&mut rect) } == kResultOk {
        rect_size(&rect)
    } else {
        DEFAULT_SIZE
    };
    let resizable = unsafe { view.canResize() } == kResultTrue;

    let event_loop = build_event_loop()?;
    let window = WindowBuilder::new()
        .with_title(format!("Editor: {title}"))
        .with_inner_size(PhysicalSize::new(width, height))
        .with_resizable(resizable)
        .build(&event_loop)
        .map_err(|e| HostError::Editor(format!("Failed to create window: {e}")))?;
    let window = Arc::new(window);
    log::debug!("Editor window created. Inner Size: {:?}", window.inner_size());

    let parent = parent_handle(&window)?;
    let frame = ComWrapper::new(PlugFrame {
        window: Arc::clone(&window),
        run_loop: RunLoop::default(),
    });
    let frame_ptr = frame
        .to_com_ptr::<IPlugFrame>()
        .ok_or_else(|| HostError::Editor("Failed to create IPlugFrame".to_string()))?;

    unsafe {
        view.setFrame(frame_ptr.as_ptr());
        let attached = view.attached(parent, PLATFORM_TYPE.as_ptr());
        if attached != kResultOk {
            view.setFrame(std::ptr::null_mut());
            return Err(HostError::Editor(format!(
                "IPlugView::attached failed (result={attached})"
            )));
        }
    }
    log::info!("Editor attached ({width}x{height}, resizable={resizable})");
    if cfg!(all(unix, not(target_os = "macos"))) && frame.run_loop.is_empty() {
        log::warn!("Editor registered no run loop timers or descriptors, it may not redraw");
    }

    let window_id = window.id();
    let result = event_loop.run(|event, elwt| match event {
        Event::WindowEvent { window_id: id, event } if id == window_id => match event {
            WindowEvent::CloseRequested => elwt.exit(),
            WindowEvent::Resized(size) => {
                let mut rect = ViewRect {
                    left: 0,
                    top: 0,
                    right: size.width as i32,
                    bottom: size.height as i32,
                };
                unsafe {
                    view.onSize(&mut rect);
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            let flow = match frame.run_loop.dispatch(Instant::now()) {
                Some(wake) => ControlFlow::WaitUntil(wake),
                None => ControlFlow::Wait,
            };
            elwt.set_control_flow(flow);
        }
        _ => {}
    });

    unsafe {
        view.removed();
        view.setFrame(std::ptr::null_mut());
    }
    frame.run_loop.clear();
    log::info!("Editor closed");

    result.map_err(|e| HostError::Editor(format!("Event loop failed: {e}")))
}
