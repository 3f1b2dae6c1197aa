mod proxmox_tests;
