//! Default project templates

/// Minimal `.slcp` descriptor for a bare platform project
pub fn render_descriptor(project_name: &str, sdk_version: &str, device_id: &str) -> String {
    format!(
        "project_name: {project_name}
package: platform
quality: development
sdk: {{id: gecko_sdk, version: {sdk_version}}}
description: >
  An autogenerated configuration that can be used as a starting point.
category: Example|Platform
component:
  - id: sl_system
  - id: device_init
  - id: {device_id}

"
    )
}

/// Entry point calling the SDK system init and process-action loop
pub const MAIN_TEMPLATE: &str = r#"#include "sl_component_catalog.h"
#include "sl_system_init.h"
#if defined(SL_CATALOG_POWER_MANAGER_PRESENT)
#include "sl_power_manager.h"
#endif
#if defined(SL_CATALOG_KERNEL_PRESENT)
#include "sl_system_kernel.h"
#else // SL_CATALOG_KERNEL_PRESENT
#include "sl_system_process_action.h"
#endif // SL_CATALOG_KERNEL_PRESENT
int main(void)
{
  // Initialize Silicon Labs device, system, service(s) and protocol stack(s).
  // Note that if the kernel is present, processing task(s) will be created by
  // this call.
  sl_system_init();

  // Initialize the application (needs implementation)
  // app_init();

#if defined(SL_CATALOG_KERNEL_PRESENT)
  // Start the kernel. Task(s) created in app_init() will start running.
  sl_system_kernel_start();
#else // SL_CATALOG_KERNEL_PRESENT
  while (1) {
    // Do not remove this call: Silicon Labs components process action routine
    // must be called from the super loop.
    sl_system_process_action();

    // Application process (needs implementation)
    // app_process_action();

#if defined(SL_CATALOG_POWER_MANAGER_PRESENT)
    // Let the CPU go to sleep if the system allows it.
    sl_power_manager_sleep();
#endif
  }
#endif // SL_CATALOG_KERNEL_PRESENT
}
"#;
